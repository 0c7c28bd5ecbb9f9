//! Frame loop.
//!
//! One frame walks the phases
//!
//! ```text
//! Polling -> Executing -> Decoding -> Presenting -> Throttling -> Polling
//!    |
//!    +-> Terminated (host asked to quit)
//! ```
//!
//! strictly in order on the caller's thread. Polling is the only point where
//! the loop can stop, so anything the frontend does between two calls to
//! [`FrameLoop::run_frame`] (save states, screenshots) sees a machine that is
//! between frames.

use std::thread;
use std::time::{Duration, Instant};

use crate::cpu::Cpu;
use crate::keyboard::KeyMap;
use crate::{Error, Spectrum, FRAME_PERIOD};

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Polling,
    Executing,
    Decoding,
    Presenting,
    Throttling,
    Terminated,
}

/// Input delivered by the host between frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent<K> {
    Key { key: K, pressed: bool },
    /// The window lost keyboard focus: every key is released.
    FocusLost,
    Quit,
}

/// Window/event side of the machine.
pub trait Host {
    /// Host key code, translated through a [`KeyMap`].
    type Key: PartialEq + Copy;

    /// Append every event received since the last call.
    fn poll_events(&mut self, events: &mut Vec<HostEvent<Self::Key>>);

    /// Show one frame of `width * height` 0xAARRGGBB pixels.
    fn present(&mut self, pixels: &[u32], width: usize, height: usize) -> Result<(), Error>;
}

/// Frame pacing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Sleep out the rest of each period.
    Realtime(Duration),
    /// Run frames back to back.
    Unthrottled,
}

impl Pacing {
    /// 50 Hz wall-clock pacing.
    pub fn realtime() -> Self {
        Pacing::Realtime(FRAME_PERIOD)
    }
}

/// Time left in a frame period, or `None` once the frame has overrun.
/// A frame that took exactly the period has zero left.
pub fn remaining(period: Duration, elapsed: Duration) -> Option<Duration> {
    period.checked_sub(elapsed)
}

/// Sleeps each frame out to its period. An overrun frame is followed
/// immediately by the next one: frames are never skipped or batched.
#[derive(Debug)]
pub struct Pacer {
    pacing: Pacing,
    overruns: u64,
}

impl Pacer {
    pub fn new(pacing: Pacing) -> Self {
        Pacer { pacing, overruns: 0 }
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    /// Frames that took longer than the period.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Block until `period` has passed since `frame_start`.
    pub fn throttle(&mut self, frame_start: Instant) {
        let Pacing::Realtime(period) = self.pacing else {
            return;
        };
        let elapsed = frame_start.elapsed();
        match remaining(period, elapsed) {
            Some(left) => thread::sleep(left),
            None => {
                self.overruns += 1;
                log::debug!("frame overran by {:?}", elapsed - period);
            }
        }
    }
}

/// Drives a [`Spectrum`] against a [`Host`].
pub struct FrameLoop<K> {
    keymap: KeyMap<K>,
    pacer: Pacer,
    phase: Phase,
    events: Vec<HostEvent<K>>,
}

impl<K: PartialEq + Copy> FrameLoop<K> {
    pub fn new(keymap: KeyMap<K>, pacing: Pacing) -> Self {
        FrameLoop {
            keymap,
            pacer: Pacer::new(pacing),
            phase: Phase::Polling,
            events: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    pub fn keymap(&self) -> &KeyMap<K> {
        &self.keymap
    }

    /// Run one complete frame. Returns [`Phase::Polling`] when the next frame
    /// can start, [`Phase::Terminated`] once the host asked to quit.
    pub fn run_frame<C, H>(&mut self, zx: &mut Spectrum<C>, host: &mut H) -> Result<Phase, Error>
    where
        C: Cpu,
        H: Host<Key = K>,
    {
        if self.phase == Phase::Terminated {
            return Ok(Phase::Terminated);
        }
        let start = Instant::now();

        self.phase = Phase::Polling;
        if !self.poll(zx, host) {
            self.phase = Phase::Terminated;
            log::info!("quit after {} frames", zx.frame_count());
            return Ok(Phase::Terminated);
        }

        self.phase = Phase::Executing;
        zx.execute_frame();

        self.phase = Phase::Decoding;
        zx.decode_frame();

        self.phase = Phase::Presenting;
        let geometry = zx.geometry();
        host.present(zx.framebuffer(), geometry.width(), geometry.height())?;

        self.phase = Phase::Throttling;
        self.pacer.throttle(start);

        self.phase = Phase::Polling;
        Ok(Phase::Polling)
    }

    /// Run frames until the host quits. Returns the number of frames run.
    pub fn run<C, H>(&mut self, zx: &mut Spectrum<C>, host: &mut H) -> Result<u64, Error>
    where
        C: Cpu,
        H: Host<Key = K>,
    {
        let mut frames = 0;
        while self.run_frame(zx, host)? != Phase::Terminated {
            frames += 1;
        }
        Ok(frames)
    }

    /// Apply pending host events; false on quit.
    fn poll<C: Cpu, H: Host<Key = K>>(&mut self, zx: &mut Spectrum<C>, host: &mut H) -> bool {
        self.events.clear();
        host.poll_events(&mut self.events);
        for event in self.events.drain(..) {
            match event {
                HostEvent::Quit => return false,
                HostEvent::FocusLost => zx.keyboard_mut().release_all(),
                HostEvent::Key { key, pressed } => {
                    // unmapped keys are ignored
                    self.keymap.apply(zx.keyboard_mut(), key, pressed);
                }
            }
        }
        true
    }
}
