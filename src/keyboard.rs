use std::cell::Cell;
use std::rc::Rc;

use minifb::Key;

/// Keyboard-polling capability consumed by the machine.
///
/// Returns the currently pressed key as a nibble 0-15, with 0 reserved to
/// mean "no key pressed". Reads within one cycle are idempotent.
pub trait KeyInput {
    fn read(&mut self) -> u8;
}

/// Keypad that never reports a press.
pub struct NullKeys;

impl KeyInput for NullKeys {
    fn read(&mut self) -> u8 {
        0
    }
}

/// Current-key slot shared between a host poll loop and the machine.
///
/// The host keeps one clone and writes whatever its input layer reports;
/// the machine reads through the [`KeyInput`] seam.
#[derive(Clone, Default)]
pub struct SharedKey(Rc<Cell<u8>>);

impl SharedKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: u8) {
        self.0.set(key);
    }
}

impl KeyInput for SharedKey {
    fn read(&mut self) -> u8 {
        self.0.get()
    }
}

/// Maps a host key to the classic 4x4 hex pad:
///
/// ```text
/// 1 2 3 C        1 2 3 4
/// 4 5 6 D   <-   Q W E R
/// 7 8 9 E        A S D F
/// A 0 B F        Z X C V
/// ```
pub fn key_to_nibble(key: Key) -> Option<u8> {
    match key {
        Key::Key1 => Some(0x1),
        Key::Key2 => Some(0x2),
        Key::Key3 => Some(0x3),
        Key::Key4 => Some(0xC),
        Key::Q => Some(0x4),
        Key::W => Some(0x5),
        Key::E => Some(0x6),
        Key::R => Some(0xD),
        Key::A => Some(0x7),
        Key::S => Some(0x8),
        Key::D => Some(0x9),
        Key::F => Some(0xE),
        Key::Z => Some(0xA),
        Key::X => Some(0x0),
        Key::C => Some(0xB),
        Key::V => Some(0xF),
        _ => None,
    }
}
