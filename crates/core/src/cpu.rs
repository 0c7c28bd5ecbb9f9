//! CPU contract.
//!
//! The machine drives its processor only through [`Cpu`] and the processor
//! reaches memory and I/O only through [`Bus`]. Any core that implements
//! both sides can be plugged into [`Spectrum`](crate::Spectrum); the bundled
//! one is [`Z80`](crate::z80::Z80).

/// Memory and I/O as seen from the CPU pins.
pub trait Bus {
    /// Read a byte of address space.
    fn read(&self, addr: u16) -> u8;
    /// Write a byte of address space. Targets that cannot be written are
    /// silently ignored.
    fn write(&mut self, addr: u16, value: u8);
    /// `IN` with the full 16-bit port address (high byte on A8–A15).
    fn port_in(&mut self, port: u16) -> u8;
    /// `OUT` with the full 16-bit port address.
    fn port_out(&mut self, port: u16, value: u8);
}

/// A processor core clocked in T-states.
pub trait Cpu {
    /// Execute one instruction (or accept a pending interrupt) and return
    /// the number of T-states it took.
    fn step<B: Bus>(&mut self, bus: &mut B) -> u32;

    /// Monotonic T-state counter.
    fn cycles(&self) -> u64;

    /// Raise the maskable interrupt line with `data` on the data bus. The
    /// request stays pending until the core accepts it.
    fn request_interrupt(&mut self, data: u8);

    /// Power-on reset.
    fn reset(&mut self);

    /// Run until at least `budget` T-states have elapsed; returns the number
    /// actually consumed (which may overshoot by one instruction).
    fn run_for<B: Bus>(&mut self, bus: &mut B, budget: u64) -> u64 {
        let start = self.cycles();
        while self.cycles() - start < budget {
            self.step(bus);
        }
        self.cycles() - start
    }
}
