//! ULA port 0xFE: keyboard rows in, border colour out.
//!
//! The ULA decodes only address line A0, so every even port reaches it.
//! Reads put the row-select mask on A8–A15 (active low) and return the AND
//! of all selected rows; writes latch the border colour from bits 1–3 of
//! the data byte. Odd ports are not decoded: nothing drives the bus, which
//! reads as 0xFF.

use crate::keyboard::{KeyboardMatrix, ROWS};

/// Port value when no device answers.
pub const OPEN_BUS: u8 = 0xFF;

/// Keyboard matrix and border latch behind the ULA port.
pub struct Ula {
    pub keyboard: KeyboardMatrix,
    /// Border colour (0–7)
    border: u8,
}

impl Ula {
    pub fn new() -> Self {
        Ula { keyboard: KeyboardMatrix::new(), border: 0 }
    }

    #[inline]
    fn selects_ula(port: u16) -> bool {
        port & 0x01 == 0
    }

    /// `IN` from `port`.
    pub fn port_in(&self, port: u16) -> u8 {
        if !Self::selects_ula(port) {
            return OPEN_BUS;
        }
        let select = !((port >> 8) as u8);
        let mut value = 0xFF;
        for row in 0..ROWS as u8 {
            if select & (1 << row) != 0 {
                value &= self.keyboard.row_state(row);
            }
        }
        value | 0xE0
    }

    /// `OUT` to `port`.
    pub fn port_out(&mut self, port: u16, value: u8) {
        if Self::selects_ula(port) {
            self.border = (value >> 1) & 0x07;
        }
    }

    pub fn border(&self) -> u8 {
        self.border
    }

    pub fn set_border(&mut self, color: u8) {
        self.border = color & 0x07;
    }
}

impl Default for Ula {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::MatrixKey;

    /// Port address with only `row` selected on A8–A15.
    fn row_port(row: u8) -> u16 {
        (((!(1u8 << row)) as u16) << 8) | 0xFE
    }

    #[test]
    fn test_border_write() {
        let mut ula = Ula::new();
        ula.port_out(0x00FE, 0b0000_1110);
        assert_eq!(ula.border(), 0b111);
    }

    #[test]
    fn test_border_ignores_odd_port() {
        let mut ula = Ula::new();
        ula.port_out(0x00FE, 0b0000_0100);
        ula.port_out(0x00FF, 0b0000_1110);
        assert_eq!(ula.border(), 0b010);
    }

    #[test]
    fn test_odd_port_reads_open_bus() {
        let mut ula = Ula::new();
        ula.keyboard.set_matrix_key(MatrixKey::A, true);
        assert_eq!(ula.port_in(0x00FF), OPEN_BUS);
        assert_eq!(ula.port_in(0x001F), OPEN_BUS);
    }

    #[test]
    fn test_no_rows_selected() {
        let mut ula = Ula::new();
        ula.keyboard.set_matrix_key(MatrixKey::Space, true);
        assert_eq!(ula.port_in(0xFFFE), 0xFF);
    }

    #[test]
    fn test_single_row_read() {
        let mut ula = Ula::new();
        ula.keyboard.set_matrix_key(MatrixKey::D, true); // row 1, bit 2
        assert_eq!(ula.port_in(row_port(1)), 0xFF & !0x04);
        assert_eq!(ula.port_in(row_port(0)), 0xFF, "other rows unaffected");
        ula.keyboard.set_matrix_key(MatrixKey::D, false);
        assert_eq!(ula.port_in(row_port(1)), 0xFF);
    }

    #[test]
    fn test_full_row_select() {
        let mut ula = Ula::new();
        ula.keyboard.set_matrix_key(MatrixKey::M, true); // row 7, bit 2
        assert_eq!(ula.port_in(0x00FE), 0xFB);
    }

    #[test]
    fn test_multi_row_and() {
        let mut ula = Ula::new();
        ula.keyboard.set_matrix_key(MatrixKey::CapsShift, true); // row 0, bit 0
        ula.keyboard.set_matrix_key(MatrixKey::N5, true); // row 3, bit 4
        // Rows 0 and 3 selected: A8 and A11 low.
        let port = ((!0b0000_1001u8 as u16) << 8) | 0xFE;
        assert_eq!(ula.port_in(port), 0xFF & !0x01 & !0x10);
        // Only row 0 selected: row 3's key is invisible.
        assert_eq!(ula.port_in(row_port(0)), 0xFE);
    }
}
