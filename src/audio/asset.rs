use std::collections::HashMap;
use std::sync::Arc;

use super::SoundId;

/// Fully decoded clip, resampled to the output rate.
#[derive(Debug, Clone)]
pub struct DecodedAsset {
    /// Interleaved samples
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
    pub duration: f64,
}

impl DecodedAsset {
    pub fn from_interleaved(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let frames = samples.len() / channels as usize;
        let duration = if sample_rate == 0 {
            0.0
        } else {
            frames as f64 / sample_rate as f64
        };

        Self {
            samples,
            channels,
            sample_rate,
            duration,
        }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn frame(&self, index: usize) -> &[f32] {
        let ch = self.channels as usize;
        &self.samples[index * ch..index * ch + ch]
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }
}

/// Sound id → decoded asset. One entry per id; inserting again replaces.
#[derive(Debug, Default)]
pub struct AssetCache {
    assets: HashMap<SoundId, Arc<DecodedAsset>>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the replaced asset, if any.
    pub fn insert(&mut self, id: SoundId, asset: DecodedAsset) -> Option<Arc<DecodedAsset>> {
        self.assets.insert(id, Arc::new(asset))
    }

    pub fn get(&self, id: &str) -> Option<Arc<DecodedAsset>> {
        self.assets.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.assets.contains_key(id)
    }

    pub fn duration(&self, id: &str) -> Option<f64> {
        self.assets.get(id).map(|asset| asset.duration)
    }

    pub fn remove(&mut self, id: &str) -> Option<Arc<DecodedAsset>> {
        self.assets.remove(id)
    }

    pub fn clear(&mut self) {
        self.assets.clear();
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
