//! Parsing helpers for instrument replies.
//!
//! Scalar replies may or may not carry a command header
//! (`:WAVEFORM:LENGTH 12500` vs `12500`); binary replies arrive as IEEE 488.2
//! definite-length blocks (`#<d><len><payload>`) of little-endian int16 codes.

use crate::core::SessionError;

/// Extract the first number (optionally signed, optionally in scientific
/// notation) from a reply.
pub fn parse_number(reply: &str) -> Option<f64> {
    let bytes = reply.as_bytes();
    (0..bytes.len()).find_map(|start| {
        let end = match_number(bytes, start)?;
        reply[start..end].parse::<f64>().ok()
    })
}

/// Largest count [`parse_count`] accepts.
pub const MAX_COUNT: usize = u32::MAX as usize;

/// Length-checked integer variant of [`parse_number`]. Counts above
/// [`MAX_COUNT`] are rejected.
pub fn parse_count(reply: &str) -> Option<usize> {
    let value = parse_number(reply)?;
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= MAX_COUNT as f64 {
        Some(value as usize)
    } else {
        None
    }
}

fn match_number(bytes: &[u8], start: usize) -> Option<usize> {
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut i = start;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }

    let int_end = digits_from(i);
    let mut end = if int_end + 1 < bytes.len()
        && bytes[int_end] == b'.'
        && bytes[int_end + 1].is_ascii_digit()
    {
        digits_from(int_end + 1)
    } else if int_end > i {
        int_end
    } else {
        return None;
    };

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp = end + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    Some(end)
}

/// Decode an IEEE 488.2 block of little-endian int16 samples.
pub fn decode_block(block: &[u8]) -> Result<Vec<i16>, SessionError> {
    let malformed = |msg: &str| SessionError::MalformedBlock(msg.to_string());

    if block.first() != Some(&b'#') {
        return Err(malformed("missing '#' prefix"));
    }
    let width = block
        .get(1)
        .filter(|b| b.is_ascii_digit())
        .map(|b| (b - b'0') as usize)
        .ok_or_else(|| malformed("missing length width digit"))?;

    let payload = if width == 0 {
        // Indefinite length: payload runs to the terminating newline
        let rest = &block[2..];
        rest.strip_suffix(b"\n").unwrap_or(rest)
    } else {
        let header_end = 2 + width;
        let len_field = block
            .get(2..header_end)
            .ok_or_else(|| malformed("truncated length field"))?;
        let len: usize = std::str::from_utf8(len_field)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| malformed("non-numeric length field"))?;
        block
            .get(header_end..header_end + len)
            .ok_or_else(|| malformed("payload shorter than declared length"))?
    };

    if payload.len() % 2 != 0 {
        return Err(malformed("odd payload length for 16-bit words"));
    }

    Ok(payload
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Encode samples as a definite-length block, terminated by a newline.
pub fn encode_block(samples: &[i16]) -> Vec<u8> {
    let len = (samples.len() * 2).to_string();
    let mut block = Vec::with_capacity(3 + len.len() + samples.len() * 2);
    block.push(b'#');
    block.extend_from_slice(len.len().to_string().as_bytes());
    block.extend_from_slice(len.as_bytes());
    for sample in samples {
        block.extend_from_slice(&sample.to_le_bytes());
    }
    block.push(b'\n');
    block
}
