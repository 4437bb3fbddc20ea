use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

use super::mixer::Mixer;
use crate::error::{Result, SoundboardError};

fn device_error(e: impl std::fmt::Display) -> SoundboardError {
    SoundboardError::Device(e.to_string())
}

/// Output device the mixer renders into.
pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    device_name: String,
}

impl AudioOutput {
    /// Open the named output device, or the system default.
    pub fn new(device_name: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();

        let device = if let Some(name) = device_name {
            let mut found = None;
            for device in host.output_devices().map_err(device_error)? {
                if let Ok(candidate) = device.name()
                    && candidate == name
                {
                    found = Some(device);
                    break;
                }
            }
            found.ok_or_else(|| device_error(format!("output device '{name}' not found")))?
        } else {
            host.default_output_device()
                .ok_or_else(|| device_error("no output device available"))?
        };

        let default = device.default_output_config().map_err(device_error)?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        info!(
            device = %device_name,
            sample_rate = default.sample_rate().0,
            channels = default.channels(),
            format = ?default.sample_format(),
            "output device opened"
        );

        let config = StreamConfig {
            channels: default.channels(),
            sample_rate: default.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        Ok(Self {
            device,
            config,
            device_name,
        })
    }

    /// Build and start the output stream. The callback renders the shared
    /// mixer and writes silence whenever the engine thread holds the lock.
    pub fn start(&self, mixer: Arc<Mutex<Mixer>>) -> Result<Stream> {
        let channels = self.config.channels as usize;

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if let Ok(mut mixer) = mixer.try_lock() {
                        mixer.render(data, channels);
                    } else {
                        data.fill(0.0);
                    }
                },
                move |err| {
                    error!(error = %err, "output stream error");
                },
                None,
            )
            .map_err(device_error)?;

        stream.play().map_err(device_error)?;

        info!(
            device = %self.device_name,
            sample_rate = self.config.sample_rate.0,
            "output stream started"
        );

        Ok(stream)
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}
