//! Narration audio processing.
//!
//! - [`padder`]: extends short narration clips with trailing silence
//! - [`assembler`]: places clips back to back and concatenates them into
//!   one narration track
//!
//! Both only talk to the outside world through [`MediaToolkit`], so every
//! operation here works the same against ffmpeg or a test double.
//!
//! [`MediaToolkit`]: crate::media::MediaToolkit

pub mod assembler;
pub mod padder;

pub use assembler::{place_sequentially, AssembleError, AssembledTrack, Placement, SequentialAssembler};
pub use padder::{AudioPadder, PadError, PaddedClip};
