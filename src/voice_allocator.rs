// src/voice_allocator.rs

use crate::event::Event;
use crate::voice::{Voice, VoiceContext, VoiceId};

/// Allocates and manages polyphonic voices.
///
/// Responsibilities:
/// - map note-on event ids to voices
/// - route note-offs by event id, never by note number alone
/// - expose active voices to the renderer
///
/// Does NOT:
/// - own DSP state
/// - allocate during processing
pub struct VoiceAllocator {
    voices: Vec<Voice>,
    /// Monotonic allocation counter
    allocations: u64,
}

impl VoiceAllocator {
    pub fn new(max_voices: usize) -> Self {
        let voices = (0..max_voices).map(Voice::new).collect();
        Self {
            voices,
            allocations: 0,
        }
    }

    /// Start a voice for a note-on event.
    ///
    /// Steals the oldest voice when none is free.
    /// Returns the allocated voice id.
    pub fn note_on(&mut self, event: &Event) -> Option<VoiceId> {
        self.allocations += 1;
        let started = self.allocations;

        let voice = match self.voices.iter().position(|v| !v.active) {
            Some(free) => &mut self.voices[free],
            None => self.voices.iter_mut().min_by_key(|v| v.started)?,
        };

        voice.start(event, started);
        Some(voice.id)
    }

    /// Release the voice started by the note-on this note-off belongs to.
    ///
    /// Returns the released voice, if one was still held.
    pub fn note_off(&mut self, event: &Event) -> Option<VoiceId> {
        let voice = self
            .voices
            .iter_mut()
            .find(|v| v.active && v.gate && v.event_id == event.event_id())?;

        voice.release();
        Some(voice.id)
    }

    /// Release every held voice.
    pub fn release_all(&mut self) {
        for voice in self.voices.iter_mut().filter(|v| v.active) {
            voice.release();
        }
    }

    /// Deactivate a voice (called when its sound has finished).
    pub fn deactivate(&mut self, voice_id: VoiceId) {
        if let Some(v) = self.voices.get_mut(voice_id) {
            v.deactivate();
        }
    }

    /// Deactivate every voice immediately.
    pub fn reset(&mut self) {
        for voice in &mut self.voices {
            voice.deactivate();
        }
        self.allocations = 0;
    }

    /// Iterate over active voices.
    pub fn active_voices(&self) -> impl Iterator<Item = VoiceContext> + '_ {
        self.voices
            .iter()
            .filter(|v| v.active)
            .map(VoiceContext::from)
    }

    /// Get a specific voice's context.
    pub fn get_voice(&self, id: VoiceId) -> Option<VoiceContext> {
        self.voices.get(id).map(VoiceContext::from)
    }

    /// Active voice started by the given event id.
    pub fn voice_for_event(&self, event_id: u32) -> Option<VoiceContext> {
        self.voices
            .iter()
            .find(|v| v.active && v.event_id == event_id)
            .map(VoiceContext::from)
    }

    /// Number of currently active voices.
    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|v| v.active).count()
    }

    pub fn max_voices(&self) -> usize {
        self.voices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_on(number: u8, event_id: u32) -> Event {
        let mut e = Event::note_on(1, number, 100);
        e.set_event_id(event_id);
        e
    }

    fn note_off(number: u8, event_id: u32) -> Event {
        let mut e = Event::note_off(1, number);
        e.set_event_id(event_id);
        e
    }

    #[test]
    fn test_note_off_routes_by_event_id() {
        let mut voices = VoiceAllocator::new(4);
        let first = voices.note_on(&note_on(60, 1)).unwrap();
        let second = voices.note_on(&note_on(60, 2)).unwrap();
        assert_ne!(first, second);

        // Releases the voice started by id 1 even though both play note 60
        assert_eq!(voices.note_off(&note_off(60, 1)), Some(first));
        assert!(!voices.get_voice(first).unwrap().gate);
        assert!(voices.get_voice(second).unwrap().gate);

        // Already released
        assert_eq!(voices.note_off(&note_off(60, 1)), None);
    }

    #[test]
    fn test_steals_oldest_voice() {
        let mut voices = VoiceAllocator::new(2);
        let a = voices.note_on(&note_on(60, 1)).unwrap();
        let _b = voices.note_on(&note_on(62, 2)).unwrap();

        let c = voices.note_on(&note_on(64, 3)).unwrap();
        assert_eq!(c, a);
        assert_eq!(voices.get_voice(c).unwrap().event_id, 3);
        assert_eq!(voices.active_count(), 2);
    }

    #[test]
    fn test_release_all_and_deactivate() {
        let mut voices = VoiceAllocator::new(4);
        voices.note_on(&note_on(60, 1));
        let held = voices.note_on(&note_on(64, 2)).unwrap();

        voices.release_all();
        assert!(voices.active_voices().all(|v| !v.gate));

        voices.deactivate(held);
        assert_eq!(voices.active_count(), 1);
        assert!(voices.voice_for_event(2).is_none());
        assert!(voices.voice_for_event(1).is_some());

        voices.reset();
        assert_eq!(voices.active_count(), 0);
    }

    #[test]
    fn test_zero_voices() {
        let mut voices = VoiceAllocator::new(0);
        assert_eq!(voices.note_on(&note_on(60, 1)), None);
    }
}
