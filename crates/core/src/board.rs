//! Everything the CPU can reach: the address space and the ULA port.

use crate::cpu::Bus;
use crate::memory::AddressSpace;
use crate::ula::Ula;

/// Memory plus ULA, wired to the CPU through [`Bus`].
pub struct Board {
    pub mem: AddressSpace,
    pub ula: Ula,
}

impl Board {
    pub fn new() -> Self {
        Board { mem: AddressSpace::new(), ula: Ula::new() }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for Board {
    #[inline(always)]
    fn read(&self, addr: u16) -> u8 {
        self.mem.read(addr)
    }

    #[inline(always)]
    fn write(&mut self, addr: u16, value: u8) {
        self.mem.write(addr, value);
    }

    fn port_in(&mut self, port: u16) -> u8 {
        self.ula.port_in(port)
    }

    fn port_out(&mut self, port: u16, value: u8) {
        self.ula.port_out(port, value);
    }
}
