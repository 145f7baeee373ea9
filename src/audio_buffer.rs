// src/audio_buffer.rs

/// Borrowed planar sample block: channel 0 frames, then channel 1 frames.
#[derive(Debug)]
pub struct AudioBuffer<'a> {
    pub channels: usize,
    pub frames: usize,
    pub data: &'a mut [f32],
}

impl<'a> AudioBuffer<'a> {
    /// Wrap existing planar data.
    #[inline]
    pub fn new(data: &'a mut [f32], channels: usize) -> Self {
        let frames = if channels == 0 { 0 } else { data.len() / channels };
        Self {
            channels,
            frames,
            data,
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    #[inline]
    pub fn channel(&self, ch: usize) -> &[f32] {
        let start = ch * self.frames;
        &self.data[start..start + self.frames]
    }

    #[inline]
    pub fn channel_mut(&mut self, ch: usize) -> &mut [f32] {
        let start = ch * self.frames;
        &mut self.data[start..start + self.frames]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planar_layout() {
        let mut data = [0.0f32; 8];
        let mut buffer = AudioBuffer::new(&mut data, 2);
        assert_eq!(buffer.frames, 4);

        buffer.channel_mut(1).fill(1.0);
        assert_eq!(buffer.channel(0), &[0.0; 4]);
        assert_eq!(buffer.channel(1), &[1.0; 4]);

        buffer.clear();
        assert!(data.iter().all(|&s| s == 0.0));
    }
}
