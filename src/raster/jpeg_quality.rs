// photoprep/src/raster/jpeg_quality.rs
//! Recover the quality setting a JPEG was written with.
//!
//! Encoders derived from the IJG library scale the Annex K luminance table by
//! a quality factor. Comparing the file's first luminance table against each
//! scaled candidate gives back the quality that produced it.

const STD_LUMA_QTABLE: [u16; 64] = [
    16, 11, 10, 16, 24, 40, 51, 61, //
    12, 12, 14, 19, 26, 58, 60, 55, //
    14, 13, 16, 24, 40, 57, 69, 56, //
    14, 17, 22, 29, 51, 87, 80, 62, //
    18, 22, 37, 56, 68, 109, 103, 77, //
    24, 35, 55, 64, 81, 104, 113, 92, //
    49, 64, 78, 87, 103, 121, 120, 101, //
    72, 92, 95, 98, 112, 100, 103, 99,
];

const MARKER_SOI: u8 = 0xD8;
const MARKER_SOS: u8 = 0xDA;
const MARKER_DQT: u8 = 0xDB;
const MARKER_EOI: u8 = 0xD9;

/// Estimate the encode quality of a JPEG byte stream.
///
/// Returns `None` for anything that is not a JPEG or carries no luminance table.
pub fn estimate_quality(data: &[u8]) -> Option<u8> {
    let table = luminance_table(data)?;
    let actual: u32 = table.iter().map(|&v| u32::from(v)).sum();

    let mut best: Option<(u8, u32)> = None;
    for quality in 1..=100u8 {
        let expected: u32 = scaled_table(quality).iter().map(|&v| u32::from(v)).sum();
        let diff = actual.abs_diff(expected);

        match best {
            Some((_, best_diff)) if best_diff <= diff => {}
            _ => best = Some((quality, diff)),
        }
    }

    best.map(|(quality, _)| quality)
}

/// The standard luminance table as an IJG-style encoder scales it for `quality`.
fn scaled_table(quality: u8) -> [u16; 64] {
    let quality = u32::from(quality.clamp(1, 100));
    let scale = if quality < 50 {
        5000 / quality
    } else {
        200 - quality * 2
    };

    let mut table = [0u16; 64];
    for (out, &base) in table.iter_mut().zip(STD_LUMA_QTABLE.iter()) {
        let value = (u32::from(base) * scale + 50) / 100;
        *out = value.clamp(1, 255) as u16;
    }
    table
}

/// First quantization table with destination id 0, in file (zigzag) order.
fn luminance_table(data: &[u8]) -> Option<[u16; 64]> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != MARKER_SOI {
        return None;
    }

    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];

        // fill bytes
        if marker == 0xFF {
            pos += 1;
            continue;
        }

        if marker == MARKER_SOS || marker == MARKER_EOI {
            return None;
        }

        let length = usize::from(u16::from_be_bytes([data[pos + 2], data[pos + 3]]));
        let segment_end = pos + 2 + length;
        if length < 2 || segment_end > data.len() {
            return None;
        }

        if marker == MARKER_DQT {
            if let Some(table) = find_table_in_segment(&data[pos + 4..segment_end]) {
                return Some(table);
            }
        }

        pos = segment_end;
    }

    None
}

fn find_table_in_segment(mut segment: &[u8]) -> Option<[u16; 64]> {
    while let Some((&spec, rest)) = segment.split_first() {
        let precision = spec >> 4;
        let id = spec & 0x0F;
        let entry_size = if precision == 0 { 1 } else { 2 };

        if rest.len() < 64 * entry_size {
            return None;
        }

        if id == 0 {
            let mut table = [0u16; 64];
            for (i, value) in table.iter_mut().enumerate() {
                *value = if entry_size == 1 {
                    u16::from(rest[i])
                } else {
                    u16::from_be_bytes([rest[i * 2], rest[i * 2 + 1]])
                };
            }
            return Some(table);
        }

        segment = &rest[64 * entry_size..];
    }

    None
}
