//! LZSS decompression over a 4096-byte window.
//!
//! A control byte supplies one flag per step, least significant bit first. A
//! set flag copies one literal byte; a clear flag reads a two-byte reference:
//! a 12-bit window slot and a 4-bit length biased by [`MIN_MATCH`]. Window
//! slots are numbered from [`WINDOW_START`] at output position zero, and
//! slots that precede the output read as spaces.

pub const WINDOW_SIZE: usize = 4096;

/// Window slot that receives the first output byte.
pub const WINDOW_START: usize = 0xFEE;

pub const MIN_MATCH: usize = 3;

/// Fill byte for references before the start of the output.
const FILL: u8 = b' ';

const WINDOW_MASK: usize = WINDOW_SIZE - 1;

/// Decompress `src`, producing at most `expected_size` bytes.
///
/// A reference running past `expected_size` is cut short. If `src` runs out
/// first, the bytes produced so far are returned.
pub fn decompress(src: &[u8], expected_size: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(expected_size);
    let mut input = src.iter().copied();
    // Bit 8 onwards tracks how many flags are left in the current byte.
    let mut flags: u32 = 0;

    'stream: while out.len() < expected_size {
        flags >>= 1;
        if flags & 0x100 == 0 {
            let Some(control) = input.next() else {
                break;
            };
            flags = u32::from(control) | 0xFF00;
        }

        if flags & 1 != 0 {
            let Some(byte) = input.next() else {
                break;
            };
            out.push(byte);
            continue;
        }

        let (Some(lo), Some(hi)) = (input.next(), input.next()) else {
            break;
        };
        let slot = usize::from(lo) | (usize::from(hi & 0xF0) << 4);
        let len = usize::from(hi & 0x0F) + MIN_MATCH;
        let distance = match (out.len() + WINDOW_START + WINDOW_SIZE - slot) & WINDOW_MASK {
            0 => WINDOW_SIZE,
            d => d,
        };
        for _ in 0..len {
            if out.len() >= expected_size {
                break 'stream;
            }
            let byte = match out.len().checked_sub(distance) {
                Some(i) => out[i],
                None => FILL,
            };
            out.push(byte);
        }
    }

    if out.len() < expected_size {
        log::warn!(
            "[window] input exhausted after {} of {expected_size} bytes",
            out.len()
        );
    }
    out
}

/// Encode `data` as an all-literal stream that [`decompress`] reproduces.
pub fn compress_literal(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len().div_ceil(8));
    for group in data.chunks(8) {
        out.push((0xFFu16 >> (8 - group.len())) as u8);
        out.extend_from_slice(group);
    }
    out
}
