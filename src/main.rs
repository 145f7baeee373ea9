// src/main.rs

use std::env;

use log::{info, warn};

use blockevent::{
    Engine, EngineConfig, Event, EventBuffer, EventHandoff, MidiBlock, SubBlock, SubBlockRenderer,
    VoiceAllocator,
};

/// Environment variable selecting the log level
const LOG_LEVEL_VAR: &str = "BLOCKEVENT_LOG";

// ===============================
// Test Renderer
// ===============================

/// Logs every sub-block that carries events.
struct LoggingRenderer;

impl SubBlockRenderer for LoggingRenderer {
    fn render(&mut self, sub_block: &SubBlock, events: &[Event], voices: &mut VoiceAllocator) {
        if events.is_empty() {
            return;
        }

        for event in events {
            info!(
                "  @{:>5} +{:<3} {:?} note {} id {}",
                sub_block.start_sample,
                event.timestamp(),
                event.event_type(),
                event.number(),
                event.event_id()
            );
        }
        info!("  {} voice(s) active", voices.active_count());
    }
}

// ===============================
// Main
// ===============================

fn main() {
    let level = env::var(LOG_LEVEL_VAR)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(log::Level::Info);
    simple_logger::init_with_level(level).unwrap();

    let config = EngineConfig::default()
        .with_block_frames(256)
        .with_sub_block_frames(32)
        .with_max_voices(8);

    // --------------------------------
    // Engine
    // --------------------------------

    let mut engine: Engine = Engine::new(config);
    let mut renderer = LoggingRenderer;

    // --------------------------------
    // Event handoff (double buffer)
    // --------------------------------

    let (mut producer, mut consumer) = EventHandoff::new().split();
    let mut working: EventBuffer = EventBuffer::new();
    let mut midi = MidiBlock::new();

    // --------------------------------
    // Run a few blocks
    // --------------------------------

    info!("Starting engine sanity test");

    for block in 0..4 {
        info!("--- Block {} ---", block);

        // Host side: collect this block's MIDI
        midi.clear();
        match block {
            0 => {
                midi.push(&[0x90, 60, 100], 10);
                midi.push(&[0x90, 64, 90], 10);
                midi.push(&[0xB0, 1, 64], 100);
                midi.push(&[0x90, 67, 80], 300);
            }
            1 => {
                midi.push(&[0x80, 60, 0], 0);
                midi.push(&[0xE0, 0x00, 0x50], 40);
            }
            2 => {
                midi.push(&[0xB0, 123, 0], 128);
            }
            _ => {}
        }

        if block == 1 {
            match engine.schedule_artificial_note_on(1, 72, 100, 64) {
                Ok(id) => info!("Scheduled artificial note with id {}", id),
                Err(e) => warn!("Could not schedule artificial note: {}", e),
            }
        }

        match producer.write_buffer().map(|buffer| buffer.add_events(midi.iter())) {
            Some(Ok(summary)) => info!(
                "Loaded {} event(s), skipped {}",
                summary.loaded, summary.skipped
            ),
            Some(Err(e)) => warn!("Incomplete block: {}", e),
            None => warn!("No free buffer, block {} not sent", block),
        }
        producer.publish();

        // Audio thread would do this:
        if let Err(e) = consumer.take_into(&mut working) {
            warn!("Dropped published events: {}", e);
        }
        if let Err(e) = engine.process_block(&mut working, &mut renderer) {
            warn!("Block {} processed with error: {}", block, e);
        }

        info!(
            "Processed block, next @ sample {} ({} voice(s), {} held over)",
            engine.sample_position(),
            engine.active_voices(),
            engine.pending().len()
        );
    }

    info!("Sanity test completed.");
}
