// Frame sequencing pipeline workers

pub mod analyzer;
pub mod finalize;
pub mod handshake;
pub mod orchestrator;
pub mod phase;
pub mod reader;
pub mod sequencer;
pub mod types;
