// src/voice.rs

use crate::event::Event;

pub type VoiceId = usize;

/// A voice represents one sounding note.
///
/// Voices do NOT own DSP state. They only remember which note-on
/// started them so the matching note-off can find them again.
#[derive(Debug)]
pub struct Voice {
    pub id: VoiceId,
    pub active: bool,
    /// Key is still held (false once released)
    pub gate: bool,
    pub channel: u8,
    pub note: u8,
    pub velocity: u8,
    /// Id of the note-on that started this voice
    pub event_id: u32,
    /// Allocation order, used to pick the oldest voice when stealing
    pub started: u64,
    /// Transpose factor of the starting event
    pub pitch_factor: f64,
}

impl Voice {
    #[inline]
    pub fn new(id: VoiceId) -> Self {
        Self {
            id,
            active: false,
            gate: false,
            channel: 0,
            note: 0,
            velocity: 0,
            event_id: 0,
            started: 0,
            pitch_factor: 1.0,
        }
    }

    #[inline]
    pub fn start(&mut self, note_on: &Event, started: u64) {
        self.active = true;
        self.gate = true;
        self.channel = note_on.channel();
        self.note = note_on.number();
        self.velocity = note_on.value();
        self.event_id = note_on.event_id();
        self.started = started;
        self.pitch_factor = note_on.pitch_factor();
    }

    #[inline]
    pub fn release(&mut self) {
        self.gate = false;
    }

    #[inline]
    pub fn deactivate(&mut self) {
        self.active = false;
        self.gate = false;
    }
}

/// Read-only snapshot of a voice handed to renderers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceContext {
    pub id: VoiceId,
    pub gate: bool,
    pub channel: u8,
    pub note: u8,
    pub velocity: u8,
    pub event_id: u32,
    pub pitch_factor: f64,
}

impl From<&Voice> for VoiceContext {
    fn from(v: &Voice) -> Self {
        Self {
            id: v.id,
            gate: v.gate,
            channel: v.channel,
            note: v.note,
            velocity: v.velocity,
            event_id: v.event_id,
            pitch_factor: v.pitch_factor,
        }
    }
}
