// src/event_id.rs

use crate::error::{EventError, EventResult};
use crate::event::{Event, NOTE_RANGE};
use crate::event_buffer::EventBuffer;

/// Matches note-offs to the note-on that started them.
///
/// Owned by the voice-management context and invoked once per block,
/// before voices are dispatched. Keeps one note-on per note number;
/// a second note-on for a sounding number replaces the first.
#[derive(Debug, Clone)]
pub struct EventIdHandler {
    /// Next id to hand out. Never 0.
    current_event_id: u32,

    /// Most recent note-on seen for each note number
    note_on_events: [Event; NOTE_RANGE],
}

impl Default for EventIdHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventIdHandler {
    pub fn new() -> Self {
        Self {
            current_event_id: 1,
            note_on_events: [Event::EMPTY; NOTE_RANGE],
        }
    }

    /// Forget every note and restart ids from 1.
    ///
    /// Only for full engine re-initialisation.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Assign ids to every note-on and note-off in the buffer.
    ///
    /// Note-ons get a fresh id and are remembered under their note number;
    /// note-offs take the id of the remembered note-on. Events with a note
    /// number outside `0..=127` are marked ignored, and the first such number
    /// is reported once the whole buffer has been scanned.
    pub fn handle_event_ids<const C: usize>(
        &mut self,
        buffer: &mut EventBuffer<C>,
    ) -> EventResult<()> {
        let mut result = Ok(());

        for index in 0..buffer.len() {
            let Some(mut event) = buffer.get_mut(index) else {
                break;
            };

            if !event.is_note_on() && !event.is_note_off() {
                continue;
            }

            let number = event.number();
            let Some(slot) = self.note_on_events.get_mut(number as usize) else {
                event.ignore(true);
                if result.is_ok() {
                    result = Err(EventError::InvalidNoteNumber(number));
                }
                continue;
            };

            if event.is_note_on() {
                event.set_event_id(self.current_event_id);
                *slot = *event;
                self.current_event_id = next_id(self.current_event_id);
            } else {
                event.set_event_id(slot.event_id());
            }
        }

        result
    }

    /// The note-on that the given note-off belongs to.
    ///
    /// The note-off must already have been through `handle_event_ids`.
    pub fn note_on_event_for(&self, note_off: &Event) -> EventResult<&Event> {
        debug_assert!(note_off.is_note_off());

        let number = note_off.number();
        let note_on = self
            .note_on_events
            .get(number as usize)
            .ok_or(EventError::InvalidNoteNumber(number))?;

        debug_assert_eq!(note_off.event_id(), note_on.event_id());
        Ok(note_on)
    }

    /// Issue a fresh id for a note generated without a buffer entry.
    pub fn request_event_id_for_artificial_note(&mut self) -> u32 {
        let id = self.current_event_id;
        self.current_event_id = next_id(id);
        id
    }

    /// The id the next note-on will receive.
    #[inline]
    pub fn peek_next_event_id(&self) -> u32 {
        self.current_event_id
    }
}

/// Advance an id, skipping the "unassigned" value on wrap-around.
#[inline]
fn next_id(id: u32) -> u32 {
    id.checked_add(1).unwrap_or(1)
}
