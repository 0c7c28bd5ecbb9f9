//! ZX Spectrum 48K emulator frontend.
//!
//! Two execution modes:
//!
//! - **GUI mode** (default): scaled minifb window, keyboard and gamepad
//!   input, 50 Hz pacing, FPS in the title bar.
//! - **Headless mode** (`--headless`): runs a fixed number of frames as fast
//!   as possible, optionally writing the last one as a PNG.
//!
//! GUI keys: PC keys = Spectrum keys, Left Shift = Caps Shift, Right Shift
//! or Ctrl = Symbol Shift, F2 = screenshot, F5 = save state, F9 = load
//! state, Esc = quit.

mod keys;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use gilrs::{Event as GilrsEvent, EventType, Gilrs};
use minifb::{Key, KeyRepeat, Scale, ScaleMode, Window, WindowOptions};
use spectrum_core::{
    png, savestate, Error, FrameLoop, Geometry, Host, HostEvent, Pacing, Phase, Spectrum,
    CYCLES_PER_FRAME,
};

use keys::HostKey;

#[derive(Parser, Debug)]
#[command(name = "spectrum-emu", version)]
#[command(about = "ZX Spectrum 48K emulator", long_about = None)]
struct Args {
    /// 16 KB ROM image (longer images are truncated)
    #[arg(default_value = "48.rom")]
    rom: PathBuf,

    /// Window scale factor
    #[arg(long, default_value_t = 2)]
    scale: usize,

    /// Border margin around the 256x192 screen, in pixels
    #[arg(long, default_value_t = 32)]
    border: usize,

    /// Run without a window
    #[arg(long, default_value_t = false)]
    headless: bool,

    /// Frames to run in headless mode
    #[arg(long, default_value_t = 250)]
    frames: u64,

    /// Write the final headless frame to this PNG
    #[arg(long, value_name = "PATH")]
    screenshot: Option<PathBuf>,

    /// Do not pace the GUI to 50 Hz
    #[arg(long, default_value_t = false)]
    unthrottled: bool,

    /// Save state file for F5/F9; loaded at startup if it exists
    #[arg(long, value_name = "PATH")]
    state: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .filter_module("spectrum_core", log::LevelFilter::Info)
        .filter_module("spectrum_emu", log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();

    let rom = std::fs::read(&args.rom)
        .with_context(|| format!("reading ROM {}", args.rom.display()))?;
    let mut zx = Spectrum::new();
    zx.set_geometry(Geometry::with_border(args.border));
    zx.load_rom(&rom).with_context(|| format!("loading ROM {}", args.rom.display()))?;

    let state_path = args.state.clone().unwrap_or_else(|| savestate::state_path(&args.rom));
    if args.state.is_some() && state_path.exists() {
        savestate::load_from_file(&mut zx, &state_path)?;
    }

    if args.headless {
        run_headless(&mut zx, args.frames, args.screenshot.as_deref())
    } else {
        let pacing = if args.unthrottled { Pacing::Unthrottled } else { Pacing::realtime() };
        run_gui(&mut zx, args.scale.max(1), pacing, &state_path)
    }
}

// ─── GUI Mode ───────────────────────────────────────────────────────────────

/// Between-frame commands triggered by function keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Screenshot,
    SaveState,
    LoadState,
}

/// minifb window plus optional gamepad.
struct WindowHost {
    window: Window,
    gilrs: Option<Gilrs>,
    scale: usize,
    scaled_buf: Vec<u32>,
    focused: bool,
    commands: Vec<Command>,
}

impl WindowHost {
    fn new(geometry: Geometry, scale: usize) -> Result<Self> {
        let (w, h) = (geometry.width() * scale, geometry.height() * scale);
        let mut window = Window::new(
            "ZX Spectrum 48K",
            w,
            h,
            WindowOptions {
                scale: Scale::X1,
                scale_mode: ScaleMode::AspectRatioStretch,
                resize: true,
                ..Default::default()
            },
        )
        .context("creating window")?;
        // the frame loop does its own pacing
        window.set_target_fps(0);

        let gilrs = match Gilrs::new() {
            Ok(g) => {
                for (id, gp) in g.gamepads() {
                    log::info!("gamepad [{}] \"{}\"", id, gp.name());
                }
                Some(g)
            }
            Err(e) => {
                log::warn!("gamepad support unavailable: {}", e);
                None
            }
        };

        Ok(WindowHost {
            window,
            gilrs,
            scale,
            scaled_buf: vec![0; w * h],
            focused: true,
            commands: Vec::new(),
        })
    }

    fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    fn poll_gamepad(&mut self, events: &mut Vec<HostEvent<HostKey>>) {
        let Some(gilrs) = self.gilrs.as_mut() else {
            return;
        };
        while let Some(GilrsEvent { event, .. }) = gilrs.next_event() {
            match event {
                EventType::ButtonPressed(b, _) => {
                    events.push(HostEvent::Key { key: HostKey::Pad(b), pressed: true })
                }
                EventType::ButtonReleased(b, _) => {
                    events.push(HostEvent::Key { key: HostKey::Pad(b), pressed: false })
                }
                EventType::Connected => log::info!("gamepad connected"),
                EventType::Disconnected => {
                    log::info!("gamepad disconnected");
                    events.push(HostEvent::FocusLost);
                }
                _ => {}
            }
        }
    }
}

impl Host for WindowHost {
    type Key = HostKey;

    fn poll_events(&mut self, events: &mut Vec<HostEvent<HostKey>>) {
        if !self.window.is_open() || self.window.is_key_down(Key::Escape) {
            events.push(HostEvent::Quit);
            return;
        }

        let focused = self.window.is_active();
        if self.focused && !focused {
            events.push(HostEvent::FocusLost);
        }
        self.focused = focused;

        for key in self.window.get_keys_pressed(KeyRepeat::No) {
            match key {
                Key::F2 => self.commands.push(Command::Screenshot),
                Key::F5 => self.commands.push(Command::SaveState),
                Key::F9 => self.commands.push(Command::LoadState),
                _ => events.push(HostEvent::Key { key: HostKey::Keyboard(key), pressed: true }),
            }
        }
        for key in self.window.get_keys_released() {
            events.push(HostEvent::Key { key: HostKey::Keyboard(key), pressed: false });
        }

        self.poll_gamepad(events);
    }

    fn present(&mut self, pixels: &[u32], width: usize, height: usize) -> Result<(), Error> {
        let scale = self.scale;
        let (sw, sh) = (width * scale, height * scale);
        self.scaled_buf.resize(sw * sh, 0);
        for y in 0..height {
            let src = &pixels[y * width..(y + 1) * width];
            for sy in 0..scale {
                let dst = &mut self.scaled_buf[(y * scale + sy) * sw..(y * scale + sy + 1) * sw];
                for (x, &c) in src.iter().enumerate() {
                    dst[x * scale..(x + 1) * scale].fill(c);
                }
            }
        }
        self.window
            .update_with_buffer(&self.scaled_buf, sw, sh)
            .map_err(|e| Error::Present(e.to_string()))
    }
}

fn run_gui(zx: &mut Spectrum, scale: usize, pacing: Pacing, state_path: &Path) -> Result<()> {
    let mut host = WindowHost::new(zx.geometry(), scale)?;
    let mut frame_loop = FrameLoop::new(keys::keymap(), pacing);
    log::info!("{}x scale, {:?}, state file {}", scale, pacing, state_path.display());

    let start_time = Instant::now();
    let mut last_fps_time = Instant::now();
    let mut fps_frames: u64 = 0;
    let mut screenshot_n = 0u32;

    while frame_loop.run_frame(zx, &mut host)? != Phase::Terminated {
        fps_frames += 1;

        for cmd in host.take_commands() {
            match cmd {
                Command::Screenshot => {
                    let path = PathBuf::from(format!("screenshot_{:04}.png", screenshot_n));
                    let g = zx.geometry();
                    match png::save_png(&path, g.width(), g.height(), zx.framebuffer()) {
                        Ok(()) => screenshot_n += 1,
                        Err(e) => log::error!("screenshot failed: {}", e),
                    }
                }
                Command::SaveState => {
                    if let Err(e) = savestate::save_to_file(zx, state_path) {
                        log::error!("save state failed: {}", e);
                    }
                }
                Command::LoadState => {
                    if let Err(e) = savestate::load_from_file(zx, state_path) {
                        log::error!("load state failed: {}", e);
                    }
                }
            }
        }

        if last_fps_time.elapsed() >= Duration::from_secs(2) {
            let fps = fps_frames as f64 / last_fps_time.elapsed().as_secs_f64();
            host.window.set_title(&format!("ZX Spectrum 48K - {:.0} FPS ({}x)", fps, scale));
            fps_frames = 0;
            last_fps_time = Instant::now();
        }
    }

    let e = start_time.elapsed().as_secs_f64();
    log::info!(
        "{} frames in {:.1}s ({:.1} FPS), {} overruns",
        zx.frame_count(),
        e,
        zx.frame_count() as f64 / e,
        frame_loop.pacer().overruns()
    );
    Ok(())
}

// ─── Headless Mode ──────────────────────────────────────────────────────────

/// Quits after a fixed number of frames; presents nowhere.
struct HeadlessHost {
    frames_left: u64,
}

impl Host for HeadlessHost {
    type Key = HostKey;

    fn poll_events(&mut self, events: &mut Vec<HostEvent<HostKey>>) {
        if self.frames_left == 0 {
            events.push(HostEvent::Quit);
        } else {
            self.frames_left -= 1;
        }
    }

    fn present(&mut self, _pixels: &[u32], _width: usize, _height: usize) -> Result<(), Error> {
        Ok(())
    }
}

fn run_headless(zx: &mut Spectrum, frames: u64, screenshot: Option<&Path>) -> Result<()> {
    let mut host = HeadlessHost { frames_left: frames };
    let mut frame_loop = FrameLoop::new(keys::keymap(), Pacing::Unthrottled);
    let start = Instant::now();

    while frame_loop.run_frame(zx, &mut host)? != Phase::Terminated {
        let n = zx.frame_count();
        if n % 50 == 0 {
            log::debug!(
                "frame {:5}: pc=0x{:04X} border={} halted={}",
                n,
                zx.cpu.regs.pc,
                zx.board.ula.border(),
                zx.cpu.halted
            );
        }
    }

    let e = start.elapsed().as_secs_f64();
    log::info!(
        "{} frames ({} T-states) in {:.2}s, {:.1}x real time",
        zx.frame_count(),
        zx.frame_count() * CYCLES_PER_FRAME,
        e,
        zx.frame_count() as f64 / 50.0 / e.max(1e-9)
    );

    if let Some(path) = screenshot {
        let g = zx.geometry();
        png::save_png(path, g.width(), g.height(), zx.framebuffer())
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["spectrum-emu"]);
        assert_eq!(args.rom, PathBuf::from("48.rom"));
        assert_eq!(args.scale, 2);
        assert_eq!(args.border, 32);
        assert_eq!(args.frames, 250);
        assert!(!args.headless && !args.unthrottled);
        assert!(args.screenshot.is_none() && args.state.is_none());
    }

    #[test]
    fn test_args_headless() {
        let args = Args::parse_from([
            "spectrum-emu",
            "roms/zx.rom",
            "--headless",
            "--frames",
            "10",
            "--screenshot",
            "out.png",
            "--border",
            "0",
        ]);
        assert_eq!(args.rom, PathBuf::from("roms/zx.rom"));
        assert!(args.headless);
        assert_eq!(args.frames, 10);
        assert_eq!(args.border, 0);
        assert_eq!(args.screenshot, Some(PathBuf::from("out.png")));
    }

    #[test]
    fn test_headless_runs_requested_frames() {
        let mut rom = vec![0u8; spectrum_core::ROM_SIZE];
        // LD A,4; OUT (FEh),A; HALT
        rom[..5].copy_from_slice(&[0x3E, 0x04, 0xD3, 0xFE, 0x76]);
        let mut zx = Spectrum::new();
        zx.load_rom(&rom).unwrap();
        run_headless(&mut zx, 5, None).unwrap();
        assert_eq!(zx.frame_count(), 5);
        assert_eq!(zx.board.ula.border(), 4);
    }
}
