//! 40-key matrix keyboard.
//!
//! The Spectrum keyboard is wired as 8 half-rows of 5 keys. A row is
//! selected by pulling one of the address lines A8–A15 low during an
//! `IN` from the ULA port; the 5 low data bits then read 0 for every held
//! key in the selected rows.
//!
//! Host frontends never touch row/bit numbers directly: they describe their
//! own key codes with a [`KeyMap`] table that resolves to a [`MatrixKey`].

/// Number of half-rows in the matrix.
pub const ROWS: usize = 8;
/// Keys per half-row.
pub const KEYS_PER_ROW: u8 = 5;
/// Idle row value: all five keys released.
const ROW_IDLE: u8 = 0x1F;

/// Active-low key matrix state.
pub struct KeyboardMatrix {
    /// `rows[r]` bit `b` is 0 while key (r, b) is held.
    rows: [u8; ROWS],
}

impl KeyboardMatrix {
    pub fn new() -> Self {
        KeyboardMatrix { rows: [ROW_IDLE; ROWS] }
    }

    /// Press (clear) or release (set) the bit for key (row, bit).
    ///
    /// `row` must be < 8 and `bit` < 5; [`MatrixKey::coord`] only yields
    /// valid coordinates.
    pub fn set_key(&mut self, row: u8, bit: u8, pressed: bool) {
        debug_assert!((row as usize) < ROWS && bit < KEYS_PER_ROW);
        let r = &mut self.rows[row as usize];
        if pressed {
            *r &= !(1 << bit);
        } else {
            *r |= 1 << bit;
        }
    }

    /// Press or release a physical key.
    pub fn set_matrix_key(&mut self, key: MatrixKey, pressed: bool) {
        let (row, bit) = key.coord();
        self.set_key(row, bit, pressed);
    }

    /// Row value as seen on the data bus: 5 key bits, top 3 bits high.
    #[inline]
    pub fn row_state(&self, row: u8) -> u8 {
        self.rows[row as usize] | 0xE0
    }

    /// True while the key is held.
    pub fn is_pressed(&self, key: MatrixKey) -> bool {
        let (row, bit) = key.coord();
        self.rows[row as usize] & (1 << bit) == 0
    }

    /// Release every key.
    pub fn release_all(&mut self) {
        self.rows = [ROW_IDLE; ROWS];
    }

    /// Raw 5-bit rows.
    pub fn rows(&self) -> [u8; ROWS] {
        self.rows
    }
}

impl Default for KeyboardMatrix {
    fn default() -> Self {
        Self::new()
    }
}

/// The 40 physical keys of the 48K keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixKey {
    // row 0
    CapsShift,
    Z,
    X,
    C,
    V,
    // row 1
    A,
    S,
    D,
    F,
    G,
    // row 2
    Q,
    W,
    E,
    R,
    T,
    // row 3
    N1,
    N2,
    N3,
    N4,
    N5,
    // row 4
    N0,
    N9,
    N8,
    N7,
    N6,
    // row 5
    P,
    O,
    I,
    U,
    Y,
    // row 6
    Enter,
    L,
    K,
    J,
    H,
    // row 7
    Space,
    SymbolShift,
    M,
    N,
    B,
}

/// Keys in matrix order: index = row * 5 + bit.
#[rustfmt::skip]
const LAYOUT: [MatrixKey; ROWS * KEYS_PER_ROW as usize] = {
    use MatrixKey::*;
    [
        CapsShift, Z, X, C, V,
        A, S, D, F, G,
        Q, W, E, R, T,
        N1, N2, N3, N4, N5,
        N0, N9, N8, N7, N6,
        P, O, I, U, Y,
        Enter, L, K, J, H,
        Space, SymbolShift, M, N, B,
    ]
};

impl MatrixKey {
    /// Matrix coordinate `(row, bit)` of this key.
    pub fn coord(self) -> (u8, u8) {
        let idx = self as u8;
        (idx / KEYS_PER_ROW, idx % KEYS_PER_ROW)
    }

    /// Key at a matrix coordinate, if it exists.
    pub fn at(row: u8, bit: u8) -> Option<MatrixKey> {
        if (row as usize) < ROWS && bit < KEYS_PER_ROW {
            Some(LAYOUT[(row * KEYS_PER_ROW + bit) as usize])
        } else {
            None
        }
    }

    /// Every key, in matrix order.
    pub fn all() -> &'static [MatrixKey] {
        &LAYOUT
    }
}

/// Static host-key → matrix-key table.
///
/// Built once at startup from a slice of pairs. Several host keys may map
/// to the same matrix key; they then share one matrix bit, so releasing any
/// of them releases the key.
pub struct KeyMap<K> {
    entries: Vec<(K, MatrixKey)>,
}

impl<K: PartialEq + Copy> KeyMap<K> {
    pub fn new(table: &[(K, MatrixKey)]) -> Self {
        KeyMap { entries: table.to_vec() }
    }

    /// Matrix key for a host key; `None` for unmapped keys.
    pub fn lookup(&self, key: K) -> Option<MatrixKey> {
        self.entries.iter().find(|(k, _)| *k == key).map(|&(_, m)| m)
    }

    /// Apply a host press/release. Unmapped keys are ignored.
    ///
    /// Returns true if the key was mapped.
    pub fn apply(&self, matrix: &mut KeyboardMatrix, key: K, pressed: bool) -> bool {
        match self.lookup(key) {
            Some(m) => {
                matrix.set_matrix_key(m, pressed);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
