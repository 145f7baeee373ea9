// src/codec.rs
//
// Reader side of the compressed-audio boundary.
//
// Only the header and the decode call shape live here. The block
// compression itself is provided by a `BlockDecoder` implementation.

use std::io::{Read, Write};

use log::debug;
use thiserror::Error;

use crate::audio_buffer::AudioBuffer;

/// Frames encoded per compressed block.
pub const COMPRESSION_BLOCK_SIZE: u64 = 4096;

/// Bytes occupied by the stream header.
pub const HEADER_SIZE: usize = 16;

const MAGIC: [u8; 4] = *b"HLAC";

/// Error while reading a compressed stream.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a compressed audio stream (magic {0:?})")]
    InvalidMagic([u8; 4]),

    /// Only mono and stereo streams and destinations are supported.
    #[error("unsupported channel count {0}")]
    UnsupportedChannelCount(usize),

    #[error("destination holds {available} samples, {needed} needed")]
    DestinationTooSmall { needed: usize, available: usize },
}

/// Result of a codec operation.
pub type CodecResult<T> = Result<T, CodecError>;

/// Stream header.
///
/// Layout (little-endian):
/// ```text
/// 0..4    magic "HLAC"
/// 4       version
/// 5       channel count (1 or 2)
/// 6       bits per sample
/// 7       reserved
/// 8..12   sample rate (u32)
/// 12..16  block count (u32)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecHeader {
    pub version: u8,
    pub channel_count: u8,
    pub bits_per_sample: u8,
    pub sample_rate: u32,
    pub block_count: u32,
}

impl CodecHeader {
    pub fn read_from<R: Read>(input: &mut R) -> CodecResult<Self> {
        let mut bytes = [0u8; HEADER_SIZE];
        input.read_exact(&mut bytes)?;

        let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
        if magic != MAGIC {
            return Err(CodecError::InvalidMagic(magic));
        }

        let header = Self {
            version: bytes[4],
            channel_count: bytes[5],
            bits_per_sample: bytes[6],
            sample_rate: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            block_count: u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
        };

        if !(1..=2).contains(&header.channel_count) {
            return Err(CodecError::UnsupportedChannelCount(
                header.channel_count as usize,
            ));
        }

        Ok(header)
    }

    pub fn write_to<W: Write>(&self, output: &mut W) -> CodecResult<()> {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[..4].copy_from_slice(&MAGIC);
        bytes[4] = self.version;
        bytes[5] = self.channel_count;
        bytes[6] = self.bits_per_sample;
        bytes[8..12].copy_from_slice(&self.sample_rate.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.block_count.to_le_bytes());

        output.write_all(&bytes)?;
        Ok(())
    }

    /// Total frames in the stream.
    #[inline]
    pub fn length_in_samples(&self) -> u64 {
        self.block_count as u64 * COMPRESSION_BLOCK_SIZE
    }
}

/// Sample format the host wants to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    Int16,
    Int24,
    Int32,
    Float32LE,
    Float32BE,
}

impl SampleFormat {
    #[inline]
    pub fn is_floating_point(self) -> bool {
        matches!(self, SampleFormat::Float32LE | SampleFormat::Float32BE)
    }
}

/// Decompresses audio blocks from a stream.
pub trait BlockDecoder {
    /// Prepare internal state before the first `decode`.
    fn setup_for_decompression(&mut self);

    /// Fill `destination` with the next `destination.frames` frames.
    fn decode(&mut self, destination: &mut AudioBuffer<'_>, input: &mut dyn Read) -> CodecResult<()>;
}

/// Reads decoded audio from a compressed stream.
pub struct CodecReader<R, D> {
    input: R,
    header: CodecHeader,
    decoder: D,
    uses_floating_point_data: bool,
}

impl<R: Read, D: BlockDecoder> CodecReader<R, D> {
    /// Read the header and prepare the decoder.
    pub fn new(mut input: R, mut decoder: D) -> CodecResult<Self> {
        let header = CodecHeader::read_from(&mut input)?;
        decoder.setup_for_decompression();

        debug!(
            "Opened compressed stream: {} ch, {} Hz, {} bit, {} frames",
            header.channel_count,
            header.sample_rate,
            header.bits_per_sample,
            header.length_in_samples()
        );

        Ok(Self {
            input,
            header,
            decoder,
            uses_floating_point_data: true,
        })
    }

    #[inline]
    pub fn header(&self) -> &CodecHeader {
        &self.header
    }

    #[inline]
    pub fn length_in_samples(&self) -> u64 {
        self.header.length_in_samples()
    }

    #[inline]
    pub fn uses_floating_point_data(&self) -> bool {
        self.uses_floating_point_data
    }

    pub fn set_target_data_type(&mut self, format: SampleFormat) {
        self.uses_floating_point_data = format.is_floating_point();
    }

    /// Decode the next `num_samples` frames into planar `destination`.
    ///
    /// `num_channels` selects a mono (1) or stereo (2) destination.
    pub fn read_samples(
        &mut self,
        destination: &mut [f32],
        num_channels: usize,
        num_samples: usize,
    ) -> CodecResult<()> {
        if !(1..=2).contains(&num_channels) {
            return Err(CodecError::UnsupportedChannelCount(num_channels));
        }

        let needed = num_channels * num_samples;
        let available = destination.len();
        let data = destination
            .get_mut(..needed)
            .ok_or(CodecError::DestinationTooSmall { needed, available })?;

        let mut buffer = AudioBuffer::new(data, num_channels);
        self.decoder.decode(&mut buffer, &mut self.input)
    }

    pub fn into_inner(self) -> R {
        self.input
    }
}
