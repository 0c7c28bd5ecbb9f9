//! Screenshot encoder.
//!
//! Writes 8-bit RGB PNGs straight from the 0xAARRGGBB frame buffer. The
//! IDAT stream is zlib-compressed with `miniz_oxide`; chunk CRCs are
//! computed here.

use std::path::Path;

use crate::Error;

const SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Encode `width * height` 0xAARRGGBB pixels as a PNG file. Alpha is
/// dropped.
pub fn encode_png(width: u32, height: u32, argb: &[u32]) -> Vec<u8> {
    debug_assert_eq!(argb.len(), width as usize * height as usize);

    // IHDR
    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.push(8); // bit depth
    ihdr.push(2); // color type: RGB
    ihdr.push(0); // compression
    ihdr.push(0); // filter
    ihdr.push(0); // interlace

    // Scanlines: filter byte (0 = None) + RGB
    let row_bytes = width as usize * 3 + 1;
    let mut raw = Vec::with_capacity(row_bytes * height as usize);
    for row in argb.chunks(width.max(1) as usize) {
        raw.push(0);
        for &px in row {
            raw.push((px >> 16) as u8);
            raw.push((px >> 8) as u8);
            raw.push(px as u8);
        }
    }
    let idat = miniz_oxide::deflate::compress_to_vec_zlib(&raw, 6);

    let mut png = Vec::with_capacity(idat.len() + 64);
    png.extend_from_slice(&SIGNATURE);
    write_chunk(&mut png, b"IHDR", &ihdr);
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);
    png
}

/// Encode and write a screenshot.
pub fn save_png(path: &Path, width: usize, height: usize, argb: &[u32]) -> Result<(), Error> {
    let data = encode_png(width as u32, height as u32, argb);
    std::fs::write(path, data).map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
    log::info!("screenshot saved to {}", path.display());
    Ok(())
}

fn write_chunk(out: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(chunk_type);
    out.extend_from_slice(data);
    // CRC over type + data
    let crc = crc32(chunk_type.iter().chain(data));
    out.extend_from_slice(&crc.to_be_bytes());
}

// CRC-32 (PNG/zlib polynomial)
fn crc32<'a>(bytes: impl Iterator<Item = &'a u8>) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for &b in bytes {
        crc ^= b as u32;
        for _ in 0..8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
        }
    }
    !crc
}
