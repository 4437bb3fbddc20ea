// src/audio/mixer.rs
// Output graph: buffer sources feeding per-sound gain stages into one bus

use std::collections::HashMap;
use std::sync::Arc;
use wide::f32x4;

use super::clock::Clock;
use super::gain::GainParam;
use super::DecodedAsset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GainId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

/// One playback of a decoded buffer, routed into a gain stage.
#[derive(Debug)]
struct BufferSource {
    asset: Arc<DecodedAsset>,
    looping: bool,
    gain: GainId,
    cursor: usize,
    finished: bool,
}

impl BufferSource {
    /// Writes `frames` frames mapped to `channels` into `out`.
    /// Non-looping sources output silence past the end and mark themselves finished.
    fn fill_next_frames(&mut self, out: &mut [f32], frames: usize, channels: usize) {
        let total = self.asset.frames();
        let asset_channels = self.asset.channels as usize;

        for f in 0..frames {
            let dest = &mut out[f * channels..f * channels + channels];

            if self.cursor >= total {
                if self.looping && total > 0 {
                    self.cursor = 0;
                } else {
                    self.finished = true;
                    dest.fill(0.0);
                    continue;
                }
            }

            let frame = self.asset.frame(self.cursor);
            if asset_channels == channels {
                dest.copy_from_slice(frame);
            } else {
                let mono = frame.iter().sum::<f32>() / asset_channels as f32;
                dest.fill(mono);
            }

            self.cursor += 1;
        }

        if !self.looping && self.cursor >= total {
            self.finished = true;
        }
    }
}

pub struct Mixer {
    sample_rate: u32,
    clock: Arc<dyn Clock>,
    gains: HashMap<GainId, GainParam>,
    sources: HashMap<SourceId, BufferSource>,
    next_id: u64,
    scratch: Vec<f32>,
}

impl Mixer {
    pub fn new(sample_rate: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            sample_rate,
            clock,
            gains: HashMap::new(),
            sources: HashMap::new(),
            next_id: 0,
            scratch: Vec::with_capacity(4096),
        }
    }

    fn next_raw_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn create_gain(&mut self, value: f32) -> GainId {
        let id = GainId(self.next_raw_id());
        self.gains.insert(id, GainParam::new(value));
        id
    }

    /// Returns false if the gain stage no longer exists.
    pub fn ramp_gain(&mut self, id: GainId, target: f32, duration: f64) -> bool {
        let now = self.clock.now();
        match self.gains.get_mut(&id) {
            Some(gain) => {
                gain.ramp_to(now, target, duration);
                true
            }
            None => false,
        }
    }

    /// Gain value at the current engine time.
    pub fn gain_value(&self, id: GainId) -> Option<f32> {
        let now = self.clock.now();
        self.gains.get(&id).map(|gain| gain.value_at(now))
    }

    pub fn release_gain(&mut self, id: GainId) {
        self.gains.remove(&id);
    }

    pub fn start_source(
        &mut self,
        asset: Arc<DecodedAsset>,
        looping: bool,
        gain: GainId,
        offset: f64,
    ) -> SourceId {
        let total = asset.frames();
        let mut cursor = (offset.max(0.0) * asset.sample_rate as f64) as usize;
        if looping && total > 0 {
            cursor %= total;
        }

        let id = SourceId(self.next_raw_id());
        self.sources.insert(
            id,
            BufferSource {
                asset,
                looping,
                gain,
                cursor,
                finished: !looping && cursor >= total,
            },
        );
        id
    }

    /// Stops and drops a source. Returns false if it had already ended
    /// on its own or was stopped before.
    pub fn stop_source(&mut self, id: SourceId) -> bool {
        self.sources.remove(&id).is_some()
    }

    pub fn is_source_active(&self, id: SourceId) -> bool {
        self.sources.get(&id).is_some_and(|source| !source.finished)
    }

    pub fn active_sources(&self) -> usize {
        self.sources.values().filter(|source| !source.finished).count()
    }

    pub fn gain_stages(&self) -> usize {
        self.gains.len()
    }

    /// Render one block of interleaved output starting at the current engine time.
    pub fn render(&mut self, output: &mut [f32], channels: usize) {
        clear_buffer_simd(output);

        let channels = channels.max(1);
        let frames = output.len() / channels;
        let len = frames * channels;
        if frames == 0 {
            return;
        }

        let t0 = self.clock.now();
        let dt = 1.0 / self.sample_rate as f64;
        let t_end = t0 + frames as f64 * dt;

        let Self {
            gains,
            sources,
            scratch,
            ..
        } = self;

        if scratch.len() < len {
            scratch.resize(len, 0.0);
        }

        for source in sources.values_mut() {
            if source.finished {
                continue;
            }

            let Some(gain) = gains.get(&source.gain) else {
                continue;
            };

            let block = &mut scratch[..len];
            source.fill_next_frames(block, frames, channels);

            if gain.is_ramping(t0) || gain.is_ramping(t_end) {
                for f in 0..frames {
                    let g = gain.value_at(t0 + f as f64 * dt);
                    for ch in 0..channels {
                        let idx = f * channels + ch;
                        output[idx] += block[idx] * g;
                    }
                }
            } else {
                add_buffer_simd(&mut output[..len], block, gain.value_at(t0));
            }
        }

        sources.retain(|_, source| !source.finished);

        soft_clip_simd(output);
    }
}

#[inline]
fn clear_buffer_simd(buffer: &mut [f32]) {
    let zero = f32x4::splat(0.0).to_array();
    let chunks = buffer.len() / 4;

    for i in 0..chunks {
        let idx = i * 4;
        buffer[idx..idx + 4].copy_from_slice(&zero);
    }

    for item in buffer.iter_mut().skip(chunks * 4) {
        *item = 0.0;
    }
}

/// dest += src * volume
#[inline]
fn add_buffer_simd(dest: &mut [f32], src: &[f32], volume: f32) {
    let vol_vec = f32x4::splat(volume);
    let len = dest.len().min(src.len());
    let chunks = len / 4;

    for i in 0..chunks {
        let idx = i * 4;
        let dest_vec = f32x4::new([dest[idx], dest[idx + 1], dest[idx + 2], dest[idx + 3]]);
        let src_vec = f32x4::new([src[idx], src[idx + 1], src[idx + 2], src[idx + 3]]);

        let result = dest_vec + (src_vec * vol_vec);
        dest[idx..idx + 4].copy_from_slice(&result.to_array());
    }

    for i in chunks * 4..len {
        dest[i] += src[i] * volume;
    }
}

#[inline]
fn soft_clip_simd(buffer: &mut [f32]) {
    let one = f32x4::splat(1.0);
    let neg_one = f32x4::splat(-1.0);
    let chunks = buffer.len() / 4;

    for i in 0..chunks {
        let idx = i * 4;
        let vec = f32x4::new([
            buffer[idx],
            buffer[idx + 1],
            buffer[idx + 2],
            buffer[idx + 3],
        ])
        .max(neg_one)
        .min(one);
        buffer[idx..idx + 4].copy_from_slice(&vec.to_array());
    }

    for item in buffer.iter_mut().skip(chunks * 4) {
        *item = item.clamp(-1.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::clock::ManualClock;

    fn mixer_with_clock(sample_rate: u32) -> (Mixer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (Mixer::new(sample_rate, clock.clone()), clock)
    }

    fn constant_asset(value: f32, frames: usize, sample_rate: u32) -> Arc<DecodedAsset> {
        Arc::new(DecodedAsset::from_interleaved(vec![value; frames], 1, sample_rate))
    }

    #[test]
    fn test_source_through_gain() {
        let (mut mixer, _clock) = mixer_with_clock(100);
        let gain = mixer.create_gain(0.5);
        mixer.start_source(constant_asset(0.8, 100, 100), false, gain, 0.0);

        let mut out = vec![0.0; 8];
        mixer.render(&mut out, 2);

        for sample in out {
            assert!((sample - 0.4).abs() < 1e-6);
        }
    }

    #[test]
    fn test_non_looping_source_finishes() {
        let (mut mixer, _clock) = mixer_with_clock(100);
        let gain = mixer.create_gain(1.0);
        let source = mixer.start_source(constant_asset(0.5, 3, 100), false, gain, 0.0);

        let mut out = vec![0.0; 5];
        mixer.render(&mut out, 1);

        assert_eq!(&out[..3], &[0.5, 0.5, 0.5]);
        assert_eq!(&out[3..], &[0.0, 0.0]);
        assert!(!mixer.is_source_active(source));
        // Environment already dropped it; a manual stop is tolerated
        assert!(!mixer.stop_source(source));
    }

    #[test]
    fn test_looping_source_wraps() {
        let (mut mixer, _clock) = mixer_with_clock(100);
        let gain = mixer.create_gain(1.0);
        let asset = Arc::new(DecodedAsset::from_interleaved(vec![0.1, 0.2, 0.3], 1, 100));
        let source = mixer.start_source(asset, true, gain, 0.0);

        let mut out = vec![0.0; 7];
        mixer.render(&mut out, 1);

        let expected = [0.1, 0.2, 0.3, 0.1, 0.2, 0.3, 0.1];
        for (got, want) in out.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-6);
        }
        assert!(mixer.is_source_active(source));
    }

    #[test]
    fn test_start_at_offset() {
        let (mut mixer, _clock) = mixer_with_clock(10);
        let gain = mixer.create_gain(1.0);
        let samples: Vec<f32> = (0..20).map(|i| i as f32 / 100.0).collect();
        let asset = Arc::new(DecodedAsset::from_interleaved(samples, 1, 10));
        mixer.start_source(asset, false, gain, 1.5);

        let mut out = vec![0.0; 2];
        mixer.render(&mut out, 1);
        assert!((out[0] - 0.15).abs() < 1e-6);
        assert!((out[1] - 0.16).abs() < 1e-6);
    }

    #[test]
    fn test_fade_out_ramp_reaches_silence() {
        let (mut mixer, clock) = mixer_with_clock(100);
        let gain = mixer.create_gain(1.0);
        mixer.start_source(constant_asset(0.5, 1000, 100), false, gain, 0.0);

        mixer.ramp_gain(gain, 0.0, 0.1);
        let mut out = vec![0.0; 10];
        mixer.render(&mut out, 1);

        assert!((out[0] - 0.5).abs() < 1e-6);
        assert!(out[5] < out[1]);

        clock.advance(0.1);
        mixer.render(&mut out, 1);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_stereo_asset_downmixed_to_mono_bus() {
        let (mut mixer, _clock) = mixer_with_clock(100);
        let gain = mixer.create_gain(1.0);
        let asset = Arc::new(DecodedAsset::from_interleaved(vec![0.2, 0.6], 2, 100));
        mixer.start_source(asset, false, gain, 0.0);

        let mut out = vec![0.0; 1];
        mixer.render(&mut out, 1);
        assert!((out[0] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_bus_is_limited() {
        let (mut mixer, _clock) = mixer_with_clock(100);
        for _ in 0..4 {
            let gain = mixer.create_gain(1.0);
            mixer.start_source(constant_asset(0.9, 100, 100), true, gain, 0.0);
        }

        let mut out = vec![0.0; 16];
        mixer.render(&mut out, 2);
        assert!(out.iter().all(|&s| (-1.0..=1.0).contains(&s)));
    }

    #[test]
    fn test_seek_past_end_starts_finished() {
        let (mut mixer, _clock) = mixer_with_clock(100);
        let gain = mixer.create_gain(1.0);
        let source = mixer.start_source(constant_asset(0.5, 100, 100), false, gain, 5.0);
        assert!(!mixer.is_source_active(source));
    }
}
