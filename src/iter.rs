// src/iter.rs
//
// Single-pass cursors over the live slots of an event buffer.

use std::ops::Deref;

use crate::event::Event;

/// Borrowed view of the slots a cursor has not visited yet.
///
/// Implemented for shared and exclusive slices so that one cursor
/// serves both read-only and mutable iteration.
pub trait SlotAccess: Default {
    type Item: Deref<Target = Event>;

    fn split_first(self) -> Option<(Self::Item, Self)>;
}

impl<'a> SlotAccess for &'a [Event] {
    type Item = &'a Event;

    #[inline]
    fn split_first(self) -> Option<(Self::Item, Self)> {
        <[Event]>::split_first(self)
    }
}

impl<'a> SlotAccess for &'a mut [Event] {
    type Item = EventMut<'a>;

    #[inline]
    fn split_first(self) -> Option<(Self::Item, Self)> {
        <[Event]>::split_first_mut(self).map(|(first, rest)| (EventMut::new(first), rest))
    }
}

/// Exclusive handle to an event stored in a buffer.
///
/// Everything but the timestamp can be changed; the buffer owns
/// timestamps so that its ordering holds.
#[derive(Debug)]
pub struct EventMut<'a> {
    event: &'a mut Event,
}

impl<'a> EventMut<'a> {
    #[inline]
    pub(crate) fn new(event: &'a mut Event) -> Self {
        Self { event }
    }

    #[inline]
    pub fn set_event_id(&mut self, event_id: u32) {
        self.event.set_event_id(event_id);
    }

    #[inline]
    pub fn set_transpose(&mut self, semitones: i8, cents: i8) {
        self.event.set_transpose(semitones, cents);
    }

    #[inline]
    pub fn set_artificial(&mut self) {
        self.event.set_artificial();
    }

    #[inline]
    pub fn ignore(&mut self, should_be_ignored: bool) {
        self.event.ignore(should_be_ignored);
    }
}

impl Deref for EventMut<'_> {
    type Target = Event;

    #[inline]
    fn deref(&self) -> &Event {
        self.event
    }
}

/// Forward-only cursor over a buffer's live events.
///
/// Ignored events are never yielded. A cursor cannot be rewound;
/// construct a new one to scan the buffer again.
#[derive(Debug)]
pub struct EventCursor<S> {
    remaining: S,
}

/// Read-only cursor.
pub type Iter<'a> = EventCursor<&'a [Event]>;

/// Cursor handing out in-place mutable access.
pub type IterMut<'a> = EventCursor<&'a mut [Event]>;

impl<S: SlotAccess> EventCursor<S> {
    #[inline]
    pub(crate) fn new(live: S) -> Self {
        Self { remaining: live }
    }

    /// Copy out the next event together with its sample position.
    ///
    /// Artificial events are included.
    pub fn next_event(&mut self) -> Option<(Event, i32)> {
        self.next_event_pointer(false)
            .map(|e| (*e, e.timestamp()))
    }

    /// In-place access to the next event.
    ///
    /// With `skip_artificial` set, artificial events are passed over too.
    pub fn next_event_pointer(&mut self, skip_artificial: bool) -> Option<S::Item> {
        loop {
            let (first, rest) = std::mem::take(&mut self.remaining).split_first()?;
            self.remaining = rest;

            if first.is_ignored() || (skip_artificial && first.is_artificial()) {
                continue;
            }

            return Some(first);
        }
    }
}

impl<S: SlotAccess> Iterator for EventCursor<S> {
    type Item = S::Item;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.next_event_pointer(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_events() -> [Event; 4] {
        let mut events = [
            Event::note_on(1, 60, 100),
            Event::note_on(1, 62, 100),
            Event::note_on(1, 64, 100),
            Event::note_off(1, 60),
        ];
        for (i, e) in events.iter_mut().enumerate() {
            e.set_timestamp(i as i32 * 10);
        }
        events[1].ignore(true);
        events[2].set_artificial();
        events
    }

    #[test]
    fn test_copy_form_skips_ignored_only() {
        let events = sample_events();
        let mut iter = Iter::new(&events[..]);

        let mut positions = Vec::new();
        while let Some((event, pos)) = iter.next_event() {
            assert!(!event.is_ignored());
            positions.push(pos);
        }

        assert_eq!(positions, vec![0, 20, 30]);
        assert!(iter.next_event().is_none());
    }

    #[test]
    fn test_pointer_form_skips_artificial_on_request() {
        let events = sample_events();

        let all: Vec<i32> = Iter::new(&events[..]).map(|e| e.timestamp()).collect();
        assert_eq!(all, vec![0, 20, 30]);

        let mut iter = Iter::new(&events[..]);
        let mut real = Vec::new();
        while let Some(e) = iter.next_event_pointer(true) {
            real.push(e.timestamp());
        }
        assert_eq!(real, vec![0, 30]);
    }

    #[test]
    fn test_mutable_cursor_writes_in_place() {
        let mut events = sample_events();

        let mut iter = IterMut::new(&mut events[..]);
        while let Some(mut e) = iter.next_event_pointer(true) {
            e.set_event_id(7);
            e.set_transpose(2, 0);
        }

        assert_eq!(events[0].event_id(), 7);
        assert_eq!(events[1].event_id(), 0); // ignored
        assert_eq!(events[2].event_id(), 0); // artificial
        assert_eq!(events[3].event_id(), 7);
        assert_eq!(events[3].semitones(), 2);
        assert_eq!(events[3].timestamp(), 30);
    }
}
