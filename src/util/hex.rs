//! Converting octets into hex strings.

use std::str;


/// Encodes a octet sequence as a hex string.
///
/// The function uses `dest` as the buffer for encoding which therefore must
/// be exactly twice the length of `src`. It returns a reference to this
/// buffer as a `&str`.
///
/// # Panics
///
/// The function panics if `dest` is shorter than twice the length of `src`.
pub fn encode<'a>(src: &[u8], dest: &'a mut [u8]) -> &'a str {
    let dest = &mut dest[..src.len() * 2];
    for (s, d) in src.iter().zip(dest.chunks_mut(2)) {
        d.copy_from_slice(&encode_u8(*s));
    }
    // Only ASCII hex digits were written.
    unsafe { str::from_utf8_unchecked(dest) }
}

/// Encodes a single octet as two upper case hex digits.
pub fn encode_u8(ch: u8) -> [u8; 2] {
    [DIGITS[usize::from(ch >> 4)], DIGITS[usize::from(ch & 0x0F)]]
}

/// Encodes a octet sequence into a newly allocated string.
pub fn encode_string(src: &[u8]) -> String {
    let mut res = String::with_capacity(src.len() * 2);
    for ch in src {
        let digits = encode_u8(*ch);
        res.push(char::from(digits[0]));
        res.push(char::from(digits[1]));
    }
    res
}

/// Renders a hex key identifier as colon separated pairs of digits.
///
/// This is the form key identifiers are usually shown to humans, e.g.,
/// `AB:CD:EF`. A trailing odd digit stays on its own.
pub fn pretty_key_id(hex: &str) -> String {
    let mut res = String::with_capacity(hex.len() + hex.len() / 2);
    for (idx, ch) in hex.chars().enumerate() {
        if idx > 0 && idx % 2 == 0 {
            res.push(':');
        }
        res.push(ch);
    }
    res
}

const DIGITS: &[u8] = b"0123456789ABCDEF";


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encode_into_buffer() {
        let mut buf = [0u8; 6];
        assert_eq!(encode(b"\x00\xa5\xff", &mut buf), "00A5FF");
    }

    #[test]
    fn encode_allocated() {
        assert_eq!(encode_string(b""), "");
        assert_eq!(encode_string(b"\x12\x3f"), "123F");
    }

    #[test]
    fn pretty() {
        assert_eq!(pretty_key_id(""), "");
        assert_eq!(pretty_key_id("AB"), "AB");
        assert_eq!(pretty_key_id("ABCDEF"), "AB:CD:EF");
        assert_eq!(pretty_key_id("ABC"), "AB:C");
    }
}
