use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use super::DecodedAsset;
use crate::error::{Result, SoundboardError};

const SINC_LEN: usize = 256;

/// Resolves a sound's locator to raw bytes.
pub trait ByteSource: Send + Sync {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>>;
}

/// Turns raw bytes into a decoded asset at `target_rate`.
pub trait AudioDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8], hint: Option<&str>, target_rate: u32) -> Result<DecodedAsset>;
}

/// Local files, addressed by plain path or `file://` URI.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSource;

impl ByteSource for FileSource {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>> {
        let path = locator.strip_prefix("file://").unwrap_or(locator);
        std::fs::read(path).map_err(|source| SoundboardError::Fetch {
            locator: locator.to_string(),
            source,
        })
    }
}

/// WAV through hound, everything else through symphonia.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDecoder;

impl AudioDecoder for DefaultDecoder {
    fn decode(&self, bytes: &[u8], hint: Option<&str>, target_rate: u32) -> Result<DecodedAsset> {
        let (samples, channels, sample_rate) = if is_wav(bytes) {
            decode_wav(bytes)?
        } else {
            decode_compressed(bytes, hint)?
        };

        if samples.len() < channels as usize {
            return Err(SoundboardError::EmptyAudio);
        }

        let samples = if sample_rate == target_rate {
            samples
        } else {
            debug!(from = sample_rate, to = target_rate, "resampling clip");
            resample_interleaved(&samples, channels as usize, sample_rate, target_rate)?
        };

        Ok(DecodedAsset::from_interleaved(samples, channels, target_rate))
    }
}

/// File extension of a locator, used as a format hint.
pub fn extension_hint(locator: &str) -> Option<&str> {
    Path::new(locator).extension().and_then(|ext| ext.to_str())
}

fn is_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

fn decode_wav(bytes: &[u8]) -> Result<(Vec<f32>, u16, u32)> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            // Convert integer samples to float in [-1.0, 1.0]
            let max_value = 2_i64.pow(spec.bits_per_sample as u32 - 1) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_value))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    Ok((samples, spec.channels, spec.sample_rate))
}

fn decode_compressed(bytes: &[u8], hint: Option<&str>) -> Result<(Vec<f32>, u16, u32)> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let mut probe_hint = Hint::new();
    if let Some(ext) = hint {
        probe_hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &probe_hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| SoundboardError::Decode("no audio track found".to_string()))?;
    let track_id = track.id;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    let mut channels = 0u16;
    let mut sample_rate = 0u32;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                channels = spec.channels.count() as u16;
                sample_rate = spec.rate;

                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                debug!("skipping undecodable packet: {}", e);
            }
            Err(e) => return Err(e.into()),
        }
    }

    if channels == 0 || sample_rate == 0 || samples.is_empty() {
        return Err(SoundboardError::EmptyAudio);
    }

    Ok((samples, channels, sample_rate))
}

fn resample_interleaved(
    samples: &[f32],
    channels: usize,
    input_rate: u32,
    output_rate: u32,
) -> Result<Vec<f32>> {
    let frames = samples.len() / channels;
    let ratio = output_rate as f64 / input_rate as f64;

    // Zero tail so the filter delay does not swallow the end of the clip
    let padded_frames = frames + SINC_LEN;
    let mut planar = vec![vec![0.0f32; padded_frames]; channels];
    for (i, frame) in samples.chunks_exact(channels).enumerate() {
        for (ch, &sample) in frame.iter().enumerate() {
            planar[ch][i] = sample;
        }
    }

    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, padded_frames, channels)
        .map_err(|e| SoundboardError::Resample(e.to_string()))?;

    let output = resampler
        .process(&planar, None)
        .map_err(|e| SoundboardError::Resample(e.to_string()))?;

    let delay = ((SINC_LEN / 2) as f64 * ratio).round() as usize;
    let expected = (frames as f64 * ratio).round() as usize;
    let available = output.first().map(|ch| ch.len()).unwrap_or(0);
    let start = delay.min(available);
    let end = (start + expected).min(available);

    let mut interleaved = Vec::with_capacity((end - start) * channels);
    for i in start..end {
        for channel in &output {
            interleaved.push(channel[i]);
        }
    }

    Ok(interleaved)
}

/// Encodes interleaved float samples as a 32-bit float WAV.
pub fn encode_wav(samples: &[f32], channels: u16, sample_rate: u32) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut bytes = Vec::new();
    {
        let mut writer = WavWriter::new(Cursor::new(&mut bytes), spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }

    Ok(bytes)
}
