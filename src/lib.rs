// src/lib.rs
//
// Block-based event core: sorted event buffers, note-on/note-off
// correlation, and sub-block dispatch to voices.

pub mod audio_buffer;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod event_buffer;
pub mod event_id;
pub mod handoff;
pub mod iter;
pub mod source;
pub mod voice;
pub mod voice_allocator;

// Re-export key types for Rust consumers
pub use codec::{BlockDecoder, CodecError, CodecHeader, CodecReader, CodecResult, SampleFormat};
pub use config::EngineConfig;
pub use engine::{Engine, SubBlock, SubBlockRenderer};
pub use error::{EventError, EventResult};
pub use event::{Event, EventFlags, EventType};
pub use event_buffer::{DEFAULT_EVENT_CAPACITY, EventBuffer};
pub use event_id::EventIdHandler;
pub use handoff::{EventConsumer, EventHandoff, EventProducer};
pub use iter::EventMut;
pub use source::{LoadSummary, MidiBlock, RawMessage};
pub use voice::{VoiceContext, VoiceId};
pub use voice_allocator::VoiceAllocator;
