// src/handoff.rs

use log::trace;
use ringbuf::traits::{Consumer as _, Producer as _, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::error::EventResult;
use crate::event_buffer::{DEFAULT_EVENT_CAPACITY, EventBuffer};

type Slot<const C: usize> = Box<EventBuffer<C>>;

/// Double buffer for per-block event lists.
///
/// Single producer (MIDI input / sequencer)
/// Single consumer (audio thread)
///
/// Two buffers circulate between the halves. A published buffer is
/// only handed back to the producer after the consumer has copied it
/// out, so the producer never writes a buffer the consumer is reading.
pub struct EventHandoff<const C: usize = DEFAULT_EVENT_CAPACITY> {
    producer: EventProducer<C>,
    consumer: EventConsumer<C>,
}

impl<const C: usize> Default for EventHandoff<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const C: usize> EventHandoff<C> {
    /// Allocate both buffers. Not for the audio thread.
    pub fn new() -> Self {
        let (ready_prod, ready_cons) = HeapRb::<Slot<C>>::new(2).split();
        let (mut recycled_prod, recycled_cons) = HeapRb::<Slot<C>>::new(2).split();

        // Second buffer starts out on the way back to the producer
        let _ = recycled_prod.try_push(Box::new(EventBuffer::new()));

        Self {
            producer: EventProducer {
                writing: Some(Box::new(EventBuffer::new())),
                ready: ready_prod,
                recycled: recycled_cons,
            },
            consumer: EventConsumer {
                ready: ready_cons,
                recycled: recycled_prod,
            },
        }
    }

    /// Separate the halves so they can move to their threads.
    pub fn split(self) -> (EventProducer<C>, EventConsumer<C>) {
        (self.producer, self.consumer)
    }
}

/// Producer half: fills a buffer and publishes it.
pub struct EventProducer<const C: usize = DEFAULT_EVENT_CAPACITY> {
    writing: Option<Slot<C>>,
    ready: HeapProd<Slot<C>>,
    recycled: HeapCons<Slot<C>>,
}

impl<const C: usize> EventProducer<C> {
    /// The buffer to fill for the next publish.
    ///
    /// `None` while both buffers are waiting for the consumer.
    pub fn write_buffer(&mut self) -> Option<&mut EventBuffer<C>> {
        if self.writing.is_none() {
            let mut buffer = self.recycled.try_pop()?;
            buffer.clear();
            self.writing = Some(buffer);
        }
        self.writing.as_deref_mut()
    }

    /// Hand the written buffer to the consumer.
    ///
    /// Returns `false` when there was no buffer to publish.
    pub fn publish(&mut self) -> bool {
        let Some(buffer) = self.writing.take() else {
            return false;
        };

        trace!("Publishing {} event(s)", buffer.len());
        match self.ready.try_push(buffer) {
            Ok(()) => true,
            Err(buffer) => {
                self.writing = Some(buffer);
                false
            }
        }
    }
}

/// Consumer half: collects published events on the audio thread.
///
/// Lock-free and allocation-free.
pub struct EventConsumer<const C: usize = DEFAULT_EVENT_CAPACITY> {
    ready: HeapCons<Slot<C>>,
    recycled: HeapProd<Slot<C>>,
}

impl<const C: usize> EventConsumer<C> {
    /// Replace `target` with every event published since the last call.
    ///
    /// Returns the number of buffers taken. When the events of several
    /// publishes do not fit, the excess is dropped and `Overflow` is
    /// returned after all buffers have been handed back.
    pub fn take_into(&mut self, target: &mut EventBuffer<C>) -> EventResult<usize> {
        target.clear();

        let mut result = Ok(());
        let mut taken = 0;

        while let Some(buffer) = self.ready.try_pop() {
            if taken == 0 {
                target.copy_from(&*buffer);
            } else if let Err(e) = target.merge_from(&*buffer) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
            taken += 1;

            // Capacity matches the number of buffers in circulation
            let _ = self.recycled.try_push(buffer);
        }

        result.map(|()| taken)
    }
}
