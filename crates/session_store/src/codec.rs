//! Reversible escaping of session and host names.
//!
//! Two layers share the `%XY` form (uppercase hex of the byte value):
//!
//! - the store layer ([`encode_store`]) makes a name safe as a single
//!   structured-store key segment;
//! - the filesystem layer ([`encode_fs`]) is applied on top of a store token
//!   and escapes the characters a bare filename cannot hold.
//!
//! The store layer escapes `%` itself, so [`decode_store`] undoes both layers
//! in a single pass.

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Upper bound for a single decoded setting value.
pub const MAX_DECODED_LEN: usize = 16 * 1024;

const FS_ILLEGAL: &[u8] = b"<>:\"/|";

fn push_escaped(out: &mut String, byte: u8) {
    out.push('%');
    out.push(char::from(HEX[usize::from(byte >> 4)]));
    out.push(char::from(HEX[usize::from(byte & 0x0f)]));
}

fn needs_store_escape(byte: u8, first: bool) -> bool {
    matches!(byte, b' ' | b'\\' | b'*' | b'?' | b'%')
        || !(b' '..=b'~').contains(&byte)
        || (byte == b'.' && first)
}

/// Escapes `name` for use as a structured-store key segment.
///
/// Space, `\`, `*`, `?`, `%`, every byte outside printable ASCII and a
/// leading `.` become `%XY`. The result is always ASCII.
#[must_use]
pub fn encode_store(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (index, &byte) in name.as_bytes().iter().enumerate() {
        if needs_store_escape(byte, index == 0) {
            push_escaped(&mut out, byte);
        } else {
            out.push(char::from(byte));
        }
    }
    out
}

/// Escapes the six characters that are illegal in filenames: `< > : " / |`.
#[must_use]
pub fn encode_fs(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    for ch in token.chars() {
        match u8::try_from(ch) {
            Ok(byte) if FS_ILLEGAL.contains(&byte) => push_escaped(&mut out, byte),
            _ => out.push(ch),
        }
    }
    out
}

/// Reverses [`encode_fs`] only, leaving store-layer escapes intact.
#[must_use]
pub fn decode_fs(filename: &str) -> String {
    let bytes = filename.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' && index + 2 < bytes.len() {
            match escaped_byte(bytes[index + 1], bytes[index + 2]) {
                Some(byte) if FS_ILLEGAL.contains(&byte) => out.push(byte),
                _ => out.extend_from_slice(&bytes[index..index + 3]),
            }
            index += 3;
        } else {
            out.push(bytes[index]);
            index += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Decodes a store token back to raw bytes.
///
/// Never fails: a `%` without two following hex digits is copied literally.
#[must_use]
pub fn decode_store_bytes(token: &str) -> Vec<u8> {
    decode_into(token.as_bytes(), usize::MAX)
}

/// Decodes a store token back to the plain name.
#[must_use]
pub fn decode_store(token: &str) -> String {
    String::from_utf8_lossy(&decode_store_bytes(token)).into_owned()
}

/// Like [`decode_store`] but stops after `max_len` decoded bytes.
#[must_use]
pub fn decode_store_capped(token: &str, max_len: usize) -> String {
    String::from_utf8_lossy(&decode_into(token.as_bytes(), max_len)).into_owned()
}

fn decode_into(bytes: &[u8], max_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len().min(max_len));
    let mut index = 0;
    while index < bytes.len() && out.len() < max_len {
        if bytes[index] == b'%' && index + 2 < bytes.len() {
            if let Some(byte) = escaped_byte(bytes[index + 1], bytes[index + 2]) {
                out.push(byte);
                index += 3;
                continue;
            }
        }
        out.push(bytes[index]);
        index += 1;
    }
    out
}

fn escaped_byte(high: u8, low: u8) -> Option<u8> {
    Some((hex_value(high)? << 4) | hex_value(low)?)
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        _ => None,
    }
}
