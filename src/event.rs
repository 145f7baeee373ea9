// src/event.rs

use bitflags::bitflags;

use crate::error::{EventError, EventResult};

/// Number of addressable note / controller numbers.
pub const NOTE_RANGE: usize = 128;

// ===============================
// Event type
// ===============================

/// What an event means.
///
/// The type is fixed when the event is constructed and never
/// reinterpreted afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EventType {
    /// Marker for a vacant buffer slot. Never produced by decoding.
    #[default]
    Empty,
    NoteOn,
    NoteOff,
    PitchBend,
    Controller,
    Aftertouch,
    AllNotesOff,
}

bitflags! {
    /// Per-event state bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventFlags: u8 {
        /// Synthesized internally rather than received from an input.
        const ARTIFICIAL = 1 << 0;
        /// Logically deleted. The slot stays occupied but iteration skips it.
        const IGNORED = 1 << 1;
    }
}

// ===============================
// Event
// ===============================

/// One musical event at one sample offset.
///
/// These events:
/// - are plain `Copy` values (RT-safe)
/// - carry their timestamp relative to the current block start
/// - carry an event id once the correlator has seen them (0 = unassigned)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Event {
    event_type: EventType,
    channel: u8,
    number: u8,
    value: u8,
    timestamp: i32,
    event_id: u32,
    semitones: i8,
    cents: i8,
    flags: EventFlags,
}

impl Event {
    /// The value every vacant buffer slot holds.
    pub const EMPTY: Event = Event {
        event_type: EventType::Empty,
        channel: 0,
        number: 0,
        value: 0,
        timestamp: 0,
        event_id: 0,
        semitones: 0,
        cents: 0,
        flags: EventFlags::empty(),
    };

    #[inline]
    pub fn new(event_type: EventType, channel: u8, number: u8, value: u8) -> Self {
        Self {
            event_type,
            channel,
            number,
            value,
            ..Self::EMPTY
        }
    }

    pub fn note_on(channel: u8, number: u8, velocity: u8) -> Self {
        Self::new(EventType::NoteOn, channel, number, velocity)
    }

    pub fn note_off(channel: u8, number: u8) -> Self {
        Self::new(EventType::NoteOff, channel, number, 0)
    }

    pub fn controller(channel: u8, number: u8, value: u8) -> Self {
        Self::new(EventType::Controller, channel, number, value)
    }

    /// Pitch-bend from a 14-bit wheel position (8192 = centre).
    pub fn pitch_bend(channel: u8, position: u16) -> Self {
        let position = position.min(0x3FFF);
        Self::new(
            EventType::PitchBend,
            channel,
            (position & 0x7F) as u8,
            (position >> 7) as u8,
        )
    }

    pub fn aftertouch(channel: u8, number: u8, pressure: u8) -> Self {
        Self::new(EventType::Aftertouch, channel, number, pressure)
    }

    pub fn all_notes_off(channel: u8) -> Self {
        Self::new(EventType::AllNotesOff, channel, 0, 0)
    }

    /// Decode a raw channel-voice message.
    ///
    /// Running status is not supported; `bytes[0]` must be a status byte.
    pub fn from_midi(bytes: &[u8]) -> EventResult<Self> {
        let Some(&status) = bytes.first() else {
            return Err(EventError::TruncatedMessage {
                expected: 1,
                found: 0,
            });
        };

        let kind = status & 0xF0;
        let channel = (status & 0x0F) + 1;

        let expected = match kind {
            0x80 | 0x90 | 0xA0 | 0xB0 | 0xE0 => 3,
            0xD0 => 2,
            _ => return Err(EventError::UnsupportedEventType { status }),
        };

        if bytes.len() < expected {
            return Err(EventError::TruncatedMessage {
                expected,
                found: bytes.len(),
            });
        }

        let data1 = bytes[1] & 0x7F;
        let data2 = bytes.get(2).map_or(0, |b| b & 0x7F);

        let event_type = match kind {
            0x90 if data2 > 0 => EventType::NoteOn,
            0x80 | 0x90 => EventType::NoteOff,
            0xE0 => EventType::PitchBend,
            // All Sound Off / All Notes Off
            0xB0 if data1 == 120 || data1 == 123 => EventType::AllNotesOff,
            0xB0 => EventType::Controller,
            _ => EventType::Aftertouch,
        };

        Ok(Self::new(event_type, channel, data1, data2))
    }

    // -------------------------------
    // MARK: Accessors
    // -------------------------------

    #[inline]
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    #[inline]
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Note number, controller number, or bend LSB depending on the type.
    #[inline]
    pub fn number(&self) -> u8 {
        self.number
    }

    /// Velocity, controller value, or bend MSB depending on the type.
    #[inline]
    pub fn value(&self) -> u8 {
        self.value
    }

    #[inline]
    pub fn timestamp(&self) -> i32 {
        self.timestamp
    }

    #[inline]
    pub fn event_id(&self) -> u32 {
        self.event_id
    }

    #[inline]
    pub fn semitones(&self) -> i8 {
        self.semitones
    }

    #[inline]
    pub fn cents(&self) -> i8 {
        self.cents
    }

    #[inline]
    pub fn flags(&self) -> EventFlags {
        self.flags
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.event_type == EventType::Empty
    }

    #[inline]
    pub fn is_note_on(&self) -> bool {
        self.event_type == EventType::NoteOn
    }

    #[inline]
    pub fn is_note_off(&self) -> bool {
        self.event_type == EventType::NoteOff
    }

    #[inline]
    pub fn is_artificial(&self) -> bool {
        self.flags.contains(EventFlags::ARTIFICIAL)
    }

    #[inline]
    pub fn is_ignored(&self) -> bool {
        self.flags.contains(EventFlags::IGNORED)
    }

    /// The combined 14-bit wheel position of a pitch-bend event.
    #[inline]
    pub fn pitch_wheel_value(&self) -> u16 {
        ((self.value as u16) << 7) | self.number as u16
    }

    // -------------------------------
    // MARK: Mutators
    // -------------------------------

    #[inline]
    pub fn set_timestamp(&mut self, timestamp: i32) {
        self.timestamp = timestamp;
    }

    #[inline]
    pub fn add_to_timestamp(&mut self, delta: i32) {
        self.timestamp = self.timestamp.wrapping_add(delta);
    }

    #[inline]
    pub fn set_event_id(&mut self, event_id: u32) {
        self.event_id = event_id;
    }

    #[inline]
    pub fn set_transpose(&mut self, semitones: i8, cents: i8) {
        self.semitones = semitones;
        self.cents = cents;
    }

    #[inline]
    pub fn set_artificial(&mut self) {
        self.flags.insert(EventFlags::ARTIFICIAL);
    }

    /// Mark the event as deleted (`true`) or restore it (`false`).
    #[inline]
    pub fn ignore(&mut self, should_be_ignored: bool) {
        self.flags.set(EventFlags::IGNORED, should_be_ignored);
    }

    // -------------------------------
    // MARK: Pitch
    // -------------------------------

    /// Pitch factor of the transpose offset with equal temperament.
    pub fn pitch_factor(&self) -> f64 {
        self.pitch_factor_with(semitones_to_pitch_factor)
    }

    /// Pitch factor of the transpose offset using a custom converter.
    ///
    /// The converter receives the offset in (fractional) semitones and is
    /// not called when the event carries no transpose.
    pub fn pitch_factor_with(&self, octave_offset_to_factor: impl Fn(f64) -> f64) -> f64 {
        if self.semitones == 0 && self.cents == 0 {
            return 1.0;
        }

        let detune = self.semitones as f64 + self.cents as f64 / 100.0;
        octave_offset_to_factor(detune)
    }
}

/// Equal-tempered frequency ratio for a semitone offset.
#[inline]
pub fn semitones_to_pitch_factor(semitone_offset: f64) -> f64 {
    2.0f64.powf(semitone_offset / 12.0)
}
