// src/engine.rs

use log::warn;

use crate::config::EngineConfig;
use crate::error::{EventError, EventResult};
use crate::event::{Event, EventType, NOTE_RANGE};
use crate::event_buffer::{DEFAULT_EVENT_CAPACITY, EventBuffer};
use crate::event_id::EventIdHandler;
use crate::voice_allocator::VoiceAllocator;

/// A contiguous region of one block, rendered in a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubBlock {
    /// Offset of the first frame within the block
    pub frame_offset: usize,

    /// Number of frames to render
    pub frame_count: usize,

    /// Absolute sample position of the first frame
    pub start_sample: u64,
}

/// Synthesis stage fed one sub-block at a time.
///
/// `events` holds the events due in this sub-block, timestamped relative
/// to its first frame. Voice starts and releases have already been applied.
pub trait SubBlockRenderer {
    fn render(&mut self, sub_block: &SubBlock, events: &[Event], voices: &mut VoiceAllocator);
}

/// Real-time voice-management context.
///
/// This struct runs exclusively on the audio thread.
/// After construction it does not allocate, lock, or block.
pub struct Engine<const C: usize = DEFAULT_EVENT_CAPACITY> {
    config: EngineConfig,

    /// Note-on / note-off correlation, persistent across blocks
    event_ids: EventIdHandler,

    /// Voice allocator and active voice set
    voices: VoiceAllocator,

    /// Events due in the sub-block being rendered
    sub_block_events: EventBuffer<C>,

    /// Events for later blocks, relative to the next block start
    pending: EventBuffer<C>,

    /// Absolute sample position of the next block
    sample_pos: u64,
}

impl<const C: usize> Engine<C> {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            event_ids: EventIdHandler::new(),
            voices: VoiceAllocator::new(config.max_voices),
            sub_block_events: EventBuffer::new(),
            pending: EventBuffer::new(),
            sample_pos: 0,
        }
    }

    /// Process one block of incoming events.
    ///
    /// Called once per audio callback. Incoming events are correlated,
    /// merged with events held over from earlier blocks, and dispatched
    /// sub-block by sub-block. Events beyond the block end are held over.
    /// `events` is empty on return.
    ///
    /// Processing always runs to the end of the block; the first error
    /// met on the way is returned afterwards.
    pub fn process_block(
        &mut self,
        events: &mut EventBuffer<C>,
        renderer: &mut impl SubBlockRenderer,
    ) -> EventResult<()> {
        let mut result = self.event_ids.handle_event_ids(events);

        if !self.pending.is_empty() {
            if let Err(e) = events.merge_from(&self.pending) {
                warn!("Dropping held-over events: {}", e);
                keep_first_error(&mut result, Err(e));
            }
            self.pending.clear();
        }

        let block_frames = self.config.effective_block_frames();
        let sub_block_frames = self.config.effective_sub_block_frames();
        let mut frame_offset = 0;

        while frame_offset < block_frames {
            let frame_count = sub_block_frames.min(block_frames - frame_offset);
            let sub_block = SubBlock {
                frame_offset,
                frame_count,
                start_sample: self.sample_pos + frame_offset as u64,
            };

            self.sub_block_events.clear();
            keep_first_error(
                &mut result,
                events
                    .move_events_below(&mut self.sub_block_events, frame_count as i32)
                    .map(|_| ()),
            );

            self.process_sub_block(&sub_block, renderer);

            events.subtract_from_timestamps(frame_count as i32);
            frame_offset += frame_count;
        }

        // `pending` was drained above, so the leftovers always fit
        self.pending.copy_from(events);
        events.clear();

        self.sample_pos += block_frames as u64;
        result
    }

    /// Apply the sub-block's events to the voices, then render it.
    #[inline]
    fn process_sub_block(&mut self, sub_block: &SubBlock, renderer: &mut impl SubBlockRenderer) {
        // Late events are due at the first frame
        self.sub_block_events.clamp_timestamps_to(0);

        for event in self.sub_block_events.iter() {
            Self::apply_event(&mut self.voices, event);
        }

        renderer.render(sub_block, self.sub_block_events.as_slice(), &mut self.voices);
    }

    /// Apply a note event to the voice table.
    #[inline]
    fn apply_event(voices: &mut VoiceAllocator, event: &Event) {
        match event.event_type() {
            EventType::NoteOn => {
                voices.note_on(event);
            }

            EventType::NoteOff => {
                voices.note_off(event);
            }

            EventType::AllNotesOff => voices.release_all(),

            _ => {}
        }
    }

    // -------------------------------
    // MARK: Artificial notes
    // -------------------------------

    /// Queue an internally generated note-on for the next block.
    ///
    /// `timestamp` is relative to the next block start. Returns the new
    /// note's event id.
    pub fn schedule_artificial_note_on(
        &mut self,
        channel: u8,
        number: u8,
        velocity: u8,
        timestamp: i32,
    ) -> EventResult<u32> {
        if number as usize >= NOTE_RANGE {
            return Err(EventError::InvalidNoteNumber(number));
        }
        if self.pending.is_full() {
            return Err(EventError::Overflow { capacity: C });
        }

        let mut event = Event::note_on(channel, number, velocity);
        event.set_timestamp(timestamp);
        event.set_artificial();
        event.set_event_id(self.event_ids.request_event_id_for_artificial_note());

        self.pending.add_event(event)?;
        Ok(event.event_id())
    }

    /// Queue the note-off for an artificial note started earlier.
    pub fn schedule_artificial_note_off(
        &mut self,
        channel: u8,
        number: u8,
        event_id: u32,
        timestamp: i32,
    ) -> EventResult<()> {
        let mut event = Event::note_off(channel, number);
        event.set_timestamp(timestamp);
        event.set_artificial();
        event.set_event_id(event_id);

        self.pending.add_event(event)
    }

    // -------------------------------
    // MARK: Accessors
    // -------------------------------

    /// Reset the engine (on transport stop or re-initialisation).
    pub fn reset(&mut self) {
        self.event_ids.reset();
        self.voices.reset();
        self.sub_block_events.clear();
        self.pending.clear();
        self.sample_pos = 0;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn event_ids(&self) -> &EventIdHandler {
        &self.event_ids
    }

    pub fn voices(&self) -> &VoiceAllocator {
        &self.voices
    }

    pub fn voices_mut(&mut self) -> &mut VoiceAllocator {
        &mut self.voices
    }

    /// Events held over for later blocks.
    pub fn pending(&self) -> &EventBuffer<C> {
        &self.pending
    }

    /// Absolute sample position of the next block.
    pub fn sample_position(&self) -> u64 {
        self.sample_pos
    }

    /// Get active voice count
    pub fn active_voices(&self) -> usize {
        self.voices.active_count()
    }
}

#[inline]
fn keep_first_error(result: &mut EventResult<()>, next: EventResult<()>) {
    if result.is_ok() {
        *result = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::VoiceContext;

    /// Records every render call.
    #[derive(Default)]
    struct RecordingRenderer {
        calls: Vec<(SubBlock, Vec<Event>, Vec<VoiceContext>)>,
    }

    impl SubBlockRenderer for RecordingRenderer {
        fn render(&mut self, sub_block: &SubBlock, events: &[Event], voices: &mut VoiceAllocator) {
            self.calls
                .push((*sub_block, events.to_vec(), voices.active_voices().collect()));
        }
    }

    fn config() -> EngineConfig {
        EngineConfig::default()
            .with_block_frames(64)
            .with_sub_block_frames(16)
            .with_max_voices(4)
    }

    fn at(mut event: Event, timestamp: i32) -> Event {
        event.set_timestamp(timestamp);
        event
    }

    #[test]
    fn test_sub_blocks_cover_the_block() {
        let mut engine: Engine<16> = Engine::new(config());
        let mut renderer = RecordingRenderer::default();
        let mut events = EventBuffer::new();

        engine.process_block(&mut events, &mut renderer).unwrap();
        engine.process_block(&mut events, &mut renderer).unwrap();

        let starts: Vec<u64> = renderer.calls.iter().map(|c| c.0.start_sample).collect();
        assert_eq!(starts, vec![0, 16, 32, 48, 64, 80, 96, 112]);
        assert!(renderer.calls.iter().all(|c| c.0.frame_count == 16));
        assert_eq!(engine.sample_position(), 128);
    }

    #[test]
    fn test_events_are_rebased_per_sub_block() {
        let mut engine: Engine<16> = Engine::new(config());
        let mut renderer = RecordingRenderer::default();
        let mut events = EventBuffer::new();
        events.add_event(at(Event::note_on(1, 60, 100), 3)).unwrap();
        events.add_event(at(Event::controller(1, 1, 10), 20)).unwrap();
        events.add_event(at(Event::note_off(1, 60), 40)).unwrap();

        engine.process_block(&mut events, &mut renderer).unwrap();
        assert!(events.is_empty());

        let calls = &renderer.calls;
        assert_eq!(calls[0].1.len(), 1);
        assert_eq!(calls[0].1[0].timestamp(), 3);
        assert_eq!(calls[1].1[0].timestamp(), 4);
        assert_eq!(calls[2].1[0].timestamp(), 8);
        assert!(calls[3].1.is_empty());

        // Voice started in the first sub-block, released in the third
        assert_eq!(calls[0].2.len(), 1);
        assert!(calls[1].2[0].gate);
        assert!(!calls[2].2[0].gate);
    }

    #[test]
    fn test_note_off_releases_matching_voice() {
        let mut engine: Engine<16> = Engine::new(config());
        let mut renderer = RecordingRenderer::default();

        let mut events = EventBuffer::new();
        events.add_event(at(Event::note_on(1, 60, 100), 0)).unwrap();
        events.add_event(at(Event::note_on(1, 60, 90), 1)).unwrap();
        engine.process_block(&mut events, &mut renderer).unwrap();
        assert_eq!(engine.active_voices(), 2);

        let mut events = EventBuffer::new();
        events.add_event(at(Event::note_off(1, 60), 0)).unwrap();
        engine.process_block(&mut events, &mut renderer).unwrap();

        // Last-writer-wins: the second note-on (id 2) is released
        let voices = engine.voices();
        assert!(voices.voice_for_event(1).unwrap().gate);
        assert!(!voices.voice_for_event(2).unwrap().gate);
    }

    #[test]
    fn test_late_events_are_held_over() {
        let mut engine: Engine<16> = Engine::new(config());
        let mut renderer = RecordingRenderer::default();

        let mut events = EventBuffer::new();
        events.add_event(at(Event::note_on(1, 60, 100), 70)).unwrap();
        engine.process_block(&mut events, &mut renderer).unwrap();

        assert_eq!(engine.active_voices(), 0);
        assert_eq!(engine.pending().len(), 1);
        assert_eq!(engine.pending().as_slice()[0].timestamp(), 6);
        let held_id = engine.pending().as_slice()[0].event_id();

        let mut events = EventBuffer::new();
        engine.process_block(&mut events, &mut renderer).unwrap();

        assert_eq!(engine.active_voices(), 1);
        assert!(engine.voices().voice_for_event(held_id).is_some());
        assert!(engine.pending().is_empty());
    }

    #[test]
    fn test_all_notes_off_releases_everything() {
        let mut engine: Engine<16> = Engine::new(config());
        let mut renderer = RecordingRenderer::default();

        let mut events = EventBuffer::new();
        events.add_event(at(Event::note_on(1, 60, 100), 0)).unwrap();
        events.add_event(at(Event::note_on(1, 64, 100), 0)).unwrap();
        events.add_event(at(Event::all_notes_off(1), 30)).unwrap();
        engine.process_block(&mut events, &mut renderer).unwrap();

        assert!(engine.voices().active_voices().all(|v| !v.gate));
    }

    #[test]
    fn test_late_event_renders_at_first_frame() {
        let mut engine: Engine<16> = Engine::new(config());
        let mut renderer = RecordingRenderer::default();

        let mut events = EventBuffer::new();
        events.add_event(at(Event::note_on(1, 60, 100), -5)).unwrap();
        events.add_event(at(Event::controller(1, 1, 10), 2)).unwrap();
        engine.process_block(&mut events, &mut renderer).unwrap();

        let first = &renderer.calls[0];
        let stamps: Vec<i32> = first.1.iter().map(|e| e.timestamp()).collect();
        assert_eq!(stamps, vec![0, 2]);
        assert_eq!(first.1[0].event_type(), EventType::NoteOn);
        assert_eq!(first.2.len(), 1);
    }

    #[test]
    fn test_held_over_overflow_is_reported() {
        let mut engine: Engine<4> = Engine::new(config());
        let mut renderer = RecordingRenderer::default();

        for number in 0..4 {
            engine
                .schedule_artificial_note_on(1, 70 + number, 100, number as i32)
                .unwrap();
        }
        assert_eq!(
            engine.schedule_artificial_note_on(1, 80, 100, 0),
            Err(EventError::Overflow { capacity: 4 })
        );

        let mut events = EventBuffer::new();
        events.add_event(at(Event::note_on(1, 60, 100), 20)).unwrap();

        assert_eq!(
            engine.process_block(&mut events, &mut renderer),
            Err(EventError::Overflow { capacity: 4 })
        );

        // Every sub-block is still rendered; the three that fit are played
        assert_eq!(renderer.calls.len(), 4);
        assert_eq!(engine.active_voices(), 4);
        assert!(engine.pending().is_empty());
        assert!(events.is_empty());
    }

    #[test]
    fn test_artificial_notes() {
        let mut engine: Engine<16> = Engine::new(config());
        let mut renderer = RecordingRenderer::default();

        let id = engine.schedule_artificial_note_on(1, 72, 100, 5).unwrap();
        let mut events = EventBuffer::new();
        events.add_event(at(Event::note_on(1, 60, 100), 0)).unwrap();
        engine.process_block(&mut events, &mut renderer).unwrap();

        assert_eq!(id, 1);
        // The incoming note-on was correlated after the artificial id was taken
        assert!(engine.voices().voice_for_event(2).is_some());
        let artificial = engine.voices().voice_for_event(id).unwrap();
        assert_eq!(artificial.note, 72);

        engine.schedule_artificial_note_off(1, 72, id, 0).unwrap();
        let mut events = EventBuffer::new();
        engine.process_block(&mut events, &mut renderer).unwrap();
        assert!(!engine.voices().voice_for_event(id).unwrap().gate);

        assert_eq!(
            engine.schedule_artificial_note_on(1, 128, 100, 0),
            Err(EventError::InvalidNoteNumber(128))
        );
    }

    #[test]
    fn test_invalid_note_is_reported_but_block_completes() {
        let mut engine: Engine<16> = Engine::new(config());
        let mut renderer = RecordingRenderer::default();

        let mut events = EventBuffer::new();
        events.add_event(at(Event::note_on(1, 130, 100), 0)).unwrap();
        events.add_event(at(Event::note_on(1, 60, 100), 2)).unwrap();

        assert_eq!(
            engine.process_block(&mut events, &mut renderer),
            Err(EventError::InvalidNoteNumber(130))
        );
        assert_eq!(renderer.calls.len(), 4);
        assert_eq!(engine.active_voices(), 1);

        engine.reset();
        assert_eq!(engine.active_voices(), 0);
        assert_eq!(engine.sample_position(), 0);
    }
}
