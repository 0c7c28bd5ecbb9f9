//! Save state (quick save / quick load).
//!
//! Captures the whole machine with bincode serialization and deflate
//! compression. The frontend binds this to F5 (save) and F9 (load).
//!
//! ## File format
//!
//! ```text
//! +------------------+
//! | Magic "ZXSS"     |  4 bytes
//! +------------------+
//! | Format version   |  u32 little-endian (currently 1)
//! +------------------+
//! | Compressed data  |  deflate-compressed bincode payload
//! +------------------+
//! ```
//!
//! The ROM is not stored: a state is only meaningful with the ROM it was
//! taken under, which the frontend loads first.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::video::Flash;
use crate::z80::Z80;
use crate::{Error, Spectrum, ADDRESS_SPACE_SIZE, ROM_SIZE};

/// Magic bytes identifying a save state file.
const MAGIC: &[u8; 4] = b"ZXSS";
/// Current save state format version.
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 8;

/// Everything needed to resume a machine between frames.
#[derive(Serialize, Deserialize)]
pub struct SaveState {
    pub cpu: Z80,
    /// 0x4000–0xFFFF
    pub ram: Vec<u8>,
    pub border: u8,
    pub flash_counter: u8,
    pub flash_inverted: bool,
    pub frame_count: u64,
}

impl SaveState {
    pub fn capture(zx: &Spectrum<Z80>) -> Self {
        let flash = zx.flash();
        SaveState {
            cpu: zx.cpu.clone(),
            ram: zx.board.mem.ram().to_vec(),
            border: zx.board.ula.border(),
            flash_counter: flash.counter(),
            flash_inverted: flash.inverted(),
            frame_count: zx.frame_count(),
        }
    }

    /// Overwrite the machine with this state. ROM is left untouched and
    /// every key is released: held keys belong to the host, not the state.
    pub fn restore(&self, zx: &mut Spectrum<Z80>) -> Result<(), Error> {
        if self.ram.len() != ADDRESS_SPACE_SIZE - ROM_SIZE {
            return Err(Error::InvalidState(format!(
                "RAM image is {} bytes, expected {}",
                self.ram.len(),
                ADDRESS_SPACE_SIZE - ROM_SIZE
            )));
        }
        zx.cpu = self.cpu.clone();
        zx.board.mem.restore_ram(&self.ram);
        zx.board.ula.set_border(self.border);
        zx.keyboard_mut().release_all();
        zx.restore_frame_state(
            Flash::from_parts(self.flash_counter, self.flash_inverted),
            self.frame_count,
        );
        Ok(())
    }
}

/// Serialize a state into the on-disk format.
pub fn encode(state: &SaveState) -> Result<Vec<u8>, Error> {
    let payload = bincode::serialize(state)?;
    let compressed = miniz_oxide::deflate::compress_to_vec(&payload, 6);

    let mut out = Vec::with_capacity(HEADER_LEN + compressed.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Parse the on-disk format, checking magic and version.
pub fn decode(data: &[u8]) -> Result<SaveState, Error> {
    if data.len() < HEADER_LEN {
        return Err(Error::InvalidState("file too small".into()));
    }
    if &data[0..4] != MAGIC {
        return Err(Error::InvalidState("bad magic".into()));
    }
    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if version != FORMAT_VERSION {
        return Err(Error::InvalidState(format!(
            "unsupported version {} (expected {})",
            version, FORMAT_VERSION
        )));
    }
    let payload = miniz_oxide::inflate::decompress_to_vec(&data[HEADER_LEN..])
        .map_err(|e| Error::InvalidState(format!("decompress: {:?}", e)))?;
    Ok(bincode::deserialize(&payload)?)
}

/// Capture `zx` and write it to `path`.
pub fn save_to_file(zx: &Spectrum<Z80>, path: &Path) -> Result<(), Error> {
    let bytes = encode(&SaveState::capture(zx))?;
    std::fs::write(path, &bytes).map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
    log::info!("saved state to {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Read `path` and restore it into `zx`.
pub fn load_from_file(zx: &mut Spectrum<Z80>, path: &Path) -> Result<(), Error> {
    let data =
        std::fs::read(path).map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
    decode(&data)?.restore(zx)?;
    log::info!("loaded state from {}", path.display());
    Ok(())
}

/// Save state path for a ROM: `roms/48.rom` → `roms/48.state`.
pub fn state_path(rom_path: &Path) -> PathBuf {
    let stem = rom_path.file_stem().and_then(|s| s.to_str()).unwrap_or("spectrum");
    rom_path.with_file_name(format!("{}.state", stem))
}
