//! Core of an 8-bit fantasy-console interpreter: registers, memory,
//! timers and framebuffer advanced one instruction at a time.
//!
//! The machine owns all mutable state and consumes three collaborator
//! capabilities: a keyboard poll ([`KeyInput`]), an audio toggle
//! ([`Audio`]) and a monotonic clock ([`timer::Clock`]). ROM acquisition
//! and rendering are the host's business; see the binary for a minifb
//! host.

pub use decode::Opcode;
pub use display::{HEIGHT, WIDTH};
pub use emulator::Chip8;
pub use error::VmError;
pub use keyboard::{KeyInput, NullKeys, SharedKey};
pub use sound::{Audio, Beeper, NullAudio};

pub mod decode;
pub mod display;
pub mod emulator;
pub mod error;
pub mod keyboard;
pub mod memory;
pub mod registers;
pub mod sound;
pub mod timer;
