//! Audio subsystem
//!
//! Decoder adapter, gain automation, output timeline and output backends.

pub mod decode;
pub mod gain;
pub mod output;
pub mod timeline;
pub mod types;

#[cfg(feature = "device")]
pub mod device;

pub use decode::{Pcm16Decoder, SegmentDecoder};
pub use gain::GainStage;
pub use output::{AudioOutput, HeadlessOutput};
pub use timeline::{CaptureTap, TapId, Timeline};
pub use types::AudioSegment;

#[cfg(feature = "device")]
pub use device::DeviceOutput;
