//! 48K address space.
//!
//! The Z80 sees a flat 64 KB space split at a fixed boundary:
//!
//! | Address Range | Content                          |
//! |---------------|----------------------------------|
//! | 0x0000–0x3FFF | ROM (16 KB, writes ignored)      |
//! | 0x4000–0x57FF | Screen bitmap (RAM)              |
//! | 0x5800–0x5AFF | Screen attributes (RAM)          |
//! | 0x5B00–0xFFFF | General RAM                      |
//!
//! Addresses are `u16`, so every access is in range by construction.

use crate::{Error, ADDRESS_SPACE_SIZE, ROM_SIZE};

/// Flat 64 KB memory with a read-only low region.
pub struct AddressSpace {
    bytes: Box<[u8; ADDRESS_SPACE_SIZE]>,
}

impl AddressSpace {
    pub fn new() -> Self {
        AddressSpace {
            bytes: Box::new([0u8; ADDRESS_SPACE_SIZE]),
        }
    }

    #[inline(always)]
    pub fn read(&self, addr: u16) -> u8 {
        self.bytes[addr as usize]
    }

    /// Write a byte. Writes below [`ROM_SIZE`] are silently dropped.
    #[inline(always)]
    pub fn write(&mut self, addr: u16, v: u8) {
        let a = addr as usize;
        if a >= ROM_SIZE {
            self.bytes[a] = v;
        }
    }

    /// Install a ROM image and clear RAM.
    ///
    /// The image must hold at least [`ROM_SIZE`] bytes. Anything past the
    /// ROM region is ignored.
    pub fn load_rom(&mut self, image: &[u8]) -> Result<(), Error> {
        if image.len() < ROM_SIZE {
            return Err(Error::RomTooShort { expected: ROM_SIZE, actual: image.len() });
        }
        if image.len() > ROM_SIZE {
            log::warn!(
                "ROM image is {} bytes, using the first {} only",
                image.len(),
                ROM_SIZE
            );
        }
        self.bytes[..ROM_SIZE].copy_from_slice(&image[..ROM_SIZE]);
        self.bytes[ROM_SIZE..].fill(0);
        log::info!("Loaded {} byte ROM", ROM_SIZE);
        Ok(())
    }

    /// The ROM region.
    pub fn rom(&self) -> &[u8] {
        &self.bytes[..ROM_SIZE]
    }

    /// The writable region (0x4000–0xFFFF).
    pub fn ram(&self) -> &[u8] {
        &self.bytes[ROM_SIZE..]
    }

    /// Overwrite RAM from a save state. Short input leaves the tail untouched.
    pub fn restore_ram(&mut self, ram: &[u8]) {
        let len = ram.len().min(ADDRESS_SPACE_SIZE - ROM_SIZE);
        self.bytes[ROM_SIZE..ROM_SIZE + len].copy_from_slice(&ram[..len]);
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rom_image(fill: u8) -> Vec<u8> {
        vec![fill; ROM_SIZE]
    }

    #[test]
    fn test_load_rom() {
        let mut mem = AddressSpace::new();
        mem.write(0x8000, 0x55);
        mem.load_rom(&rom_image(0xA5)).unwrap();
        assert_eq!(mem.read(0x0000), 0xA5);
        assert_eq!(mem.read(0x3FFF), 0xA5);
        assert_eq!(mem.read(0x4000), 0x00);
        assert_eq!(mem.read(0x8000), 0x00, "RAM is cleared on ROM load");
    }

    #[test]
    fn test_short_rom_rejected() {
        let mut mem = AddressSpace::new();
        let err = mem.load_rom(&[0u8; 100]).unwrap_err();
        assert!(matches!(err, Error::RomTooShort { expected: ROM_SIZE, actual: 100 }));
    }

    #[test]
    fn test_long_rom_truncated() {
        let mut mem = AddressSpace::new();
        let mut image = rom_image(0x11);
        image.extend_from_slice(&[0x22; 64]);
        mem.load_rom(&image).unwrap();
        assert_eq!(mem.read(0x3FFF), 0x11);
        assert_eq!(mem.read(0x4000), 0x00);
    }

    #[test]
    fn test_boundary() {
        let mut mem = AddressSpace::new();
        mem.write(0x3FFF, 0x12);
        mem.write(0x4000, 0x34);
        assert_eq!(mem.read(0x3FFF), 0x00);
        assert_eq!(mem.read(0x4000), 0x34);
    }

    #[test]
    fn test_restore_ram() {
        let mut mem = AddressSpace::new();
        let mut ram = vec![0u8; ADDRESS_SPACE_SIZE - ROM_SIZE];
        ram[0] = 0x01;
        let last = ram.len() - 1;
        ram[last] = 0x02;
        mem.restore_ram(&ram);
        assert_eq!(mem.read(0x4000), 0x01);
        assert_eq!(mem.read(0xFFFF), 0x02);
        assert_eq!(mem.ram(), &ram[..]);
    }

    proptest! {
        #[test]
        fn rom_writes_are_dropped(addr in 0u16..0x4000, v in any::<u8>(), fill in any::<u8>()) {
            let mut mem = AddressSpace::new();
            mem.load_rom(&rom_image(fill)).unwrap();
            mem.write(addr, v);
            prop_assert_eq!(mem.read(addr), fill);
        }

        #[test]
        fn ram_writes_read_back(addr in 0x4000u16..=0xFFFF, v in any::<u8>()) {
            let mut mem = AddressSpace::new();
            mem.write(addr, v);
            prop_assert_eq!(mem.read(addr), v);
        }
    }
}
