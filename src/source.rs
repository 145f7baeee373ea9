// src/source.rs
//
// Bulk loading of a host's raw MIDI block into an event buffer.

use log::warn;

use crate::error::{EventError, EventResult};
use crate::event::Event;
use crate::event_buffer::EventBuffer;

/// One raw message as delivered by the host, with its block offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMessage<'a> {
    pub bytes: &'a [u8],
    pub sample_offset: i32,
}

impl<'a> RawMessage<'a> {
    #[inline]
    pub fn new(bytes: &'a [u8], sample_offset: i32) -> Self {
        Self {
            bytes,
            sample_offset,
        }
    }
}

/// Host-side block of raw messages, sorted by sample offset.
///
/// Lives outside the audio thread: pushing may allocate.
#[derive(Debug, Clone, Default)]
pub struct MidiBlock {
    data: Vec<u8>,
    /// (start, len, sample_offset) into `data`
    entries: Vec<(usize, usize, i32)>,
}

impl MidiBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message, keeping the block ordered by offset.
    ///
    /// Messages with equal offsets keep their push order.
    pub fn push(&mut self, bytes: &[u8], sample_offset: i32) {
        let start = self.data.len();
        self.data.extend_from_slice(bytes);

        let position = self
            .entries
            .iter()
            .position(|&(_, _, offset)| offset > sample_offset)
            .unwrap_or(self.entries.len());
        self.entries
            .insert(position, (start, bytes.len(), sample_offset));
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.entries.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = RawMessage<'_>> + '_ {
        self.entries
            .iter()
            .map(|&(start, len, offset)| RawMessage::new(&self.data[start..start + len], offset))
    }
}

/// Outcome of a successful bulk load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadSummary {
    /// Events now in the buffer.
    pub loaded: usize,
    /// Messages dropped because they have no event type.
    pub skipped: usize,
}

impl<const C: usize> EventBuffer<C> {
    /// Replace the buffer contents with a host block.
    ///
    /// The block is expected in ascending offset order and is appended
    /// without re-sorting; an out-of-order message is inserted at its
    /// sorted position instead. Unsupported or malformed messages are
    /// skipped. When the buffer fills up, the remaining messages are
    /// dropped and `Overflow` is returned.
    pub fn add_events<'a, I>(&mut self, messages: I) -> EventResult<LoadSummary>
    where
        I: IntoIterator<Item = RawMessage<'a>>,
    {
        self.clear();

        let mut summary = LoadSummary::default();
        let mut messages = messages.into_iter();

        while let Some(message) = messages.next() {
            let mut event = match Event::from_midi(message.bytes) {
                Ok(event) => event,
                Err(e) => {
                    warn!("Dropping message at offset {}: {}", message.sample_offset, e);
                    summary.skipped += 1;
                    continue;
                }
            };
            event.set_timestamp(message.sample_offset);

            if let Err(e) = self.push_sorted(event) {
                let dropped = 1 + messages.by_ref().count();
                warn!("Event buffer full, dropping {} message(s)", dropped);
                return Err(e);
            }
            summary.loaded += 1;
        }

        Ok(summary)
    }
}
