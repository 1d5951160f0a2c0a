//! Voice input domain module

mod audio_clip;

pub use audio_clip::{AudioClip, AudioFormat, InvalidAudioError};
