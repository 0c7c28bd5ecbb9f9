//! Host key table.
//!
//! PC keyboard keys map onto the Spectrum key they are printed as. Both
//! shifts and both controls are taken: left shift is Caps Shift, the
//! others are Symbol Shift.
//!
//! Gamepads drive the Sinclair Interface 2 joystick, which the ROM and
//! most games read as keys on row 4:
//!
//! | Pad            | Key |
//! |----------------|-----|
//! | D-pad left     | 6   |
//! | D-pad right    | 7   |
//! | D-pad down     | 8   |
//! | D-pad up       | 9   |
//! | face buttons   | 0   |

use gilrs::Button;
use minifb::Key;
use spectrum_core::{KeyMap, MatrixKey};

/// A key from either input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKey {
    Keyboard(Key),
    Pad(Button),
}

const KEYBOARD: &[(Key, MatrixKey)] = &[
    (Key::A, MatrixKey::A), (Key::B, MatrixKey::B), (Key::C, MatrixKey::C),
    (Key::D, MatrixKey::D), (Key::E, MatrixKey::E), (Key::F, MatrixKey::F),
    (Key::G, MatrixKey::G), (Key::H, MatrixKey::H), (Key::I, MatrixKey::I),
    (Key::J, MatrixKey::J), (Key::K, MatrixKey::K), (Key::L, MatrixKey::L),
    (Key::M, MatrixKey::M), (Key::N, MatrixKey::N), (Key::O, MatrixKey::O),
    (Key::P, MatrixKey::P), (Key::Q, MatrixKey::Q), (Key::R, MatrixKey::R),
    (Key::S, MatrixKey::S), (Key::T, MatrixKey::T), (Key::U, MatrixKey::U),
    (Key::V, MatrixKey::V), (Key::W, MatrixKey::W), (Key::X, MatrixKey::X),
    (Key::Y, MatrixKey::Y), (Key::Z, MatrixKey::Z),
    (Key::Key0, MatrixKey::N0), (Key::Key1, MatrixKey::N1), (Key::Key2, MatrixKey::N2),
    (Key::Key3, MatrixKey::N3), (Key::Key4, MatrixKey::N4), (Key::Key5, MatrixKey::N5),
    (Key::Key6, MatrixKey::N6), (Key::Key7, MatrixKey::N7), (Key::Key8, MatrixKey::N8),
    (Key::Key9, MatrixKey::N9),
    (Key::Enter, MatrixKey::Enter),
    (Key::Space, MatrixKey::Space),
    (Key::LeftShift, MatrixKey::CapsShift),
    (Key::RightShift, MatrixKey::SymbolShift),
    (Key::LeftCtrl, MatrixKey::SymbolShift),
    (Key::RightCtrl, MatrixKey::SymbolShift),
];

const GAMEPAD: &[(Button, MatrixKey)] = &[
    (Button::DPadLeft, MatrixKey::N6),
    (Button::DPadRight, MatrixKey::N7),
    (Button::DPadDown, MatrixKey::N8),
    (Button::DPadUp, MatrixKey::N9),
    (Button::South, MatrixKey::N0),
    (Button::East, MatrixKey::N0),
    (Button::West, MatrixKey::N0),
    (Button::North, MatrixKey::N0),
];

/// The static host key table, built once at startup.
pub fn keymap() -> KeyMap<HostKey> {
    let table: Vec<(HostKey, MatrixKey)> = KEYBOARD
        .iter()
        .map(|&(k, m)| (HostKey::Keyboard(k), m))
        .chain(GAMEPAD.iter().map(|&(b, m)| (HostKey::Pad(b), m)))
        .collect();
    KeyMap::new(&table)
}
