// src/config.rs

// Default audio configuration
pub const DEFAULT_SAMPLE_RATE: f64 = 48_000.0;
pub const DEFAULT_BLOCK_FRAMES: usize = 512;
pub const DEFAULT_SUB_BLOCK_FRAMES: usize = 32;
pub const DEFAULT_MAX_VOICES: usize = 16;

/// Longest block whose frame offsets still fit an event timestamp
pub const MAX_BLOCK_FRAMES: usize = i32::MAX as usize;

/// Block sizing and polyphony for an `Engine`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// Frames rendered per audio callback
    pub block_frames: usize,
    /// Event raster within a block; events are applied at these boundaries
    pub sub_block_frames: usize,
    /// Maximum number of simultaneous voices
    pub max_voices: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_frames: DEFAULT_BLOCK_FRAMES,
            sub_block_frames: DEFAULT_SUB_BLOCK_FRAMES,
            max_voices: DEFAULT_MAX_VOICES,
        }
    }
}

impl EngineConfig {
    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_block_frames(mut self, block_frames: usize) -> Self {
        self.block_frames = block_frames;
        self
    }

    pub fn with_sub_block_frames(mut self, sub_block_frames: usize) -> Self {
        self.sub_block_frames = sub_block_frames;
        self
    }

    pub fn with_max_voices(mut self, max_voices: usize) -> Self {
        self.max_voices = max_voices;
        self
    }

    /// Block length actually used, capped at `MAX_BLOCK_FRAMES`.
    #[inline]
    pub fn effective_block_frames(&self) -> usize {
        self.block_frames.min(MAX_BLOCK_FRAMES)
    }

    /// Sub-block length actually used: at least one frame, at most a block.
    #[inline]
    pub fn effective_sub_block_frames(&self) -> usize {
        self.sub_block_frames
            .clamp(1, self.effective_block_frames().max(1))
    }
}
