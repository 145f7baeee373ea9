// src/error.rs
//
// Error taxonomy for the event layer.
//
// Every variant is cheap to construct and `Copy`, so it can be returned
// from the audio thread without allocating.

use thiserror::Error;

/// Error raised by event decoding, buffer mutation or id correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EventError {
    /// An insertion was attempted on a buffer that is already full.
    #[error("event buffer is full ({capacity} events)")]
    Overflow { capacity: usize },

    /// A note number outside `0..=127` reached the id correlator.
    #[error("note number {0} is outside 0..=127")]
    InvalidNoteNumber(u8),

    /// A foreign message kind that has no event type.
    #[error("unsupported message kind (status byte {status:#04x})")]
    UnsupportedEventType { status: u8 },

    /// A foreign message shorter than its status byte requires.
    #[error("message truncated: expected {expected} bytes, got {found}")]
    TruncatedMessage { expected: usize, found: usize },
}

/// Result of an event-layer operation.
pub type EventResult<T> = Result<T, EventError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let overflow = EventError::Overflow { capacity: 256 };
        assert_eq!(overflow.to_string(), "event buffer is full (256 events)");

        let unsupported = EventError::UnsupportedEventType { status: 0xF8 };
        assert_eq!(
            unsupported.to_string(),
            "unsupported message kind (status byte 0xf8)"
        );
    }
}
