// src/event_buffer.rs

use crate::error::{EventError, EventResult};
use crate::event::Event;
use crate::iter::{EventMut, Iter, IterMut};

/// Default number of events one buffer can hold per block.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Fixed-capacity buffer of events sorted by timestamp.
///
/// Invariants:
/// - `events[i].timestamp() <= events[i + 1].timestamp()` for every live pair
/// - slots `[num_used, C)` hold `Event::EMPTY`
/// - no operation allocates; all work is bounded by `C`
#[derive(Debug, Clone)]
pub struct EventBuffer<const C: usize = DEFAULT_EVENT_CAPACITY> {
    events: [Event; C],
    num_used: usize,
}

impl<const C: usize> Default for EventBuffer<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const C: usize> EventBuffer<C> {
    pub const CAPACITY: usize = C;

    pub fn new() -> Self {
        Self {
            events: [Event::EMPTY; C],
            num_used: 0,
        }
    }

    // -------------------------------
    // MARK: Accessors
    // -------------------------------

    #[inline]
    pub fn capacity(&self) -> usize {
        C
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.num_used
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_used == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.num_used >= C
    }

    /// The live events, in timestamp order (ignored ones included).
    #[inline]
    pub fn as_slice(&self) -> &[Event] {
        &self.events[..self.num_used]
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Event> {
        self.as_slice().get(index)
    }

    /// Mutable access to one live event's id, flags and transpose.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<EventMut<'_>> {
        self.events[..self.num_used].get_mut(index).map(EventMut::new)
    }

    #[inline]
    pub fn last(&self) -> Option<&Event> {
        self.as_slice().last()
    }

    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(&self.events[..self.num_used])
    }

    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_> {
        IterMut::new(&mut self.events[..self.num_used])
    }

    // -------------------------------
    // MARK: Insertion
    // -------------------------------

    /// Reset to empty, clearing every slot.
    pub fn clear(&mut self) {
        self.events.fill(Event::EMPTY);
        self.num_used = 0;
    }

    /// Insert an event at its timestamp position.
    ///
    /// The new event lands before the first live event with a later
    /// timestamp, or directly after the first one with an equal timestamp.
    pub fn add_event(&mut self, event: Event) -> EventResult<()> {
        if self.is_full() {
            return Err(EventError::Overflow { capacity: C });
        }

        let timestamp = event.timestamp();
        let position = match self
            .as_slice()
            .iter()
            .position(|e| timestamp <= e.timestamp())
        {
            Some(i) if self.events[i].timestamp() == timestamp => i + 1,
            Some(i) => i,
            None => self.num_used,
        };

        self.insert_at(position, event);
        Ok(())
    }

    /// Decode a raw message, stamp it and insert it.
    pub fn add_message(&mut self, bytes: &[u8], sample_offset: i32) -> EventResult<()> {
        let mut event = Event::from_midi(bytes)?;
        event.set_timestamp(sample_offset);
        self.add_event(event)
    }

    /// Append an event known not to precede the current last one.
    ///
    /// Falls back to a sorted insert if it does.
    pub(crate) fn push_sorted(&mut self, event: Event) -> EventResult<()> {
        match self.last() {
            Some(last) if last.timestamp() > event.timestamp() => self.add_event(event),
            _ if self.is_full() => Err(EventError::Overflow { capacity: C }),
            _ => {
                self.events[self.num_used] = event;
                self.num_used += 1;
                Ok(())
            }
        }
    }

    /// Re-insert every non-ignored event of `other`.
    ///
    /// Stops at the first event that does not fit.
    pub fn merge_from<const D: usize>(&mut self, other: &EventBuffer<D>) -> EventResult<()> {
        for event in other.iter() {
            self.add_event(*event)?;
        }
        Ok(())
    }

    /// Replace the contents with a copy of `other`.
    ///
    /// At most `C` events are copied; the rest of the slots are cleared.
    pub fn copy_from<const D: usize>(&mut self, other: &EventBuffer<D>) {
        let to_copy = other.len().min(C);

        self.events[..to_copy].copy_from_slice(&other.as_slice()[..to_copy]);
        self.events[to_copy..].fill(Event::EMPTY);
        self.num_used = to_copy;
    }

    // -------------------------------
    // MARK: Time shift and split
    // -------------------------------

    /// Shift every live event back by `delta` samples.
    pub fn subtract_from_timestamps(&mut self, delta: i32) {
        for event in &mut self.events[..self.num_used] {
            event.add_to_timestamp(delta.wrapping_neg());
        }
    }

    /// Raise every timestamp below `min` to `min`.
    ///
    /// A monotonic map, so the order is kept.
    pub fn clamp_timestamps_to(&mut self, min: i32) {
        for event in &mut self.events[..self.num_used] {
            if event.timestamp() < min {
                event.set_timestamp(min);
            }
        }
    }

    /// Move every event earlier than `threshold` into `target`.
    ///
    /// The remaining events slide down to the front. Ignored events in the
    /// moved range are dropped. If `target` fills up, the events that did
    /// not fit stay in this buffer and `Overflow` is returned.
    pub fn move_events_below<const D: usize>(
        &mut self,
        target: &mut EventBuffer<D>,
        threshold: i32,
    ) -> EventResult<usize> {
        if self.is_empty() {
            return Ok(0);
        }

        let split = self.split_index(threshold);
        let mut moved = 0;

        for consumed in 0..split {
            let event = self.events[consumed];
            if event.is_ignored() {
                continue;
            }

            if let Err(e) = target.add_event(event) {
                self.remove_range(0, consumed);
                return Err(e);
            }
            moved += 1;
        }

        self.remove_range(0, split);
        Ok(moved)
    }

    /// Move every event at or after `threshold` into `target`.
    ///
    /// If `target` fills up, the events that did not fit stay in this
    /// buffer and `Overflow` is returned.
    pub fn move_events_above<const D: usize>(
        &mut self,
        target: &mut EventBuffer<D>,
        threshold: i32,
    ) -> EventResult<usize> {
        match self.last() {
            None => return Ok(0),
            Some(last) if last.timestamp() < threshold => return Ok(0),
            _ => {}
        }

        let split = self.split_index(threshold);
        let mut end = split;

        while end < self.num_used {
            if let Err(e) = target.add_event(self.events[end]) {
                self.remove_range(split, end);
                return Err(e);
            }
            end += 1;
        }

        let moved = self.num_used - split;
        self.remove_range(split, self.num_used);
        Ok(moved)
    }

    /// Index of the first live event at or after `threshold`.
    #[inline]
    fn split_index(&self, threshold: i32) -> usize {
        self.as_slice()
            .iter()
            .position(|e| e.timestamp() >= threshold)
            .unwrap_or(self.num_used)
    }

    fn insert_at(&mut self, position: usize, event: Event) {
        debug_assert!(position <= self.num_used && self.num_used < C);

        self.events.copy_within(position..self.num_used, position + 1);
        self.events[position] = event;
        self.num_used += 1;
    }

    /// Drop the live events in `start..end`, closing the gap.
    fn remove_range(&mut self, start: usize, end: usize) {
        let removed = end - start;
        if removed == 0 {
            return;
        }

        self.events.copy_within(end..self.num_used, start);
        self.num_used -= removed;
        self.events[self.num_used..self.num_used + removed].fill(Event::EMPTY);
    }
}
