//! Byte-level helpers for the compact corpus format
//!
//! Offsets and sizes in compact index files are written in the dictd base64
//! number encoding: alphabet `A-Z a-z 0-9 + /`, most significant digit first,
//! no padding, leading zero digits dropped (zero itself is `A`).

const B64_LIST: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const XX: u8 = 0xff;

const B64_INDEX: [u8; 256] = {
    let mut table = [XX; 256];
    let mut i = 0;
    while i < 64 {
        table[B64_LIST[i] as usize] = i as u8;
        i += 1;
    }
    table
};

/// Encode a number, MSB first
pub fn b64_encode(mut val: u64) -> String {
    // 64 bits fit in 11 six-bit digits
    let mut digits = [0u8; 11];
    let mut n = 0;
    loop {
        digits[n] = B64_LIST[(val & 0x3f) as usize];
        n += 1;
        val >>= 6;
        if val == 0 {
            break;
        }
    }
    digits[..n].iter().rev().map(|&b| b as char).collect()
}

/// Decode a number; None on an illegal digit, empty input, or overflow
#[inline]
pub fn b64_decode(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() {
        return None;
    }

    let mut v: u64 = 0;
    for &b in bytes {
        let d = B64_INDEX[b as usize];
        if d == XX {
            return None;
        }
        if v >> 58 != 0 {
            return None; // another shift would overflow
        }
        v = (v << 6) | d as u64;
    }
    Some(v)
}

// Divide a bytestring into two at the last delim
#[inline]
pub fn bs_rsplit_once(bytes: &[u8], delim: u8) -> Option<(&[u8], &[u8])> {
    let pos = memchr::memrchr(delim, bytes)?;
    Some((&bytes[..pos], &bytes[pos + 1..]))
}

/// Strip a trailing `\n` or `\r\n`
#[inline]
pub fn bs_trim_newline(bytes: &[u8]) -> &[u8] {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    bytes.strip_suffix(b"\r").unwrap_or(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===== b64 Tests =====

    #[test]
    fn test_encode_known_values() {
        assert_eq!(b64_encode(0), "A");
        assert_eq!(b64_encode(1), "B");
        assert_eq!(b64_encode(63), "/");
        assert_eq!(b64_encode(64), "BA");
        assert_eq!(b64_encode(4095), "//");
        // 32-bit values match the classic dictd encoder
        assert_eq!(b64_encode(0xffff_ffff), "D/////");
    }

    #[test]
    fn test_decode_known_values() {
        assert_eq!(b64_decode(b"A"), Some(0));
        assert_eq!(b64_decode(b"AAAB"), Some(1)); // leading zero digits are harmless
        assert_eq!(b64_decode(b"BA"), Some(64));
        assert_eq!(b64_decode(b"D/////"), Some(0xffff_ffff));
        assert_eq!(b64_decode(b"P//////////"), Some(u64::MAX));
    }

    #[test]
    fn test_decode_invalid() {
        assert_eq!(b64_decode(b""), None);
        assert_eq!(b64_decode(b"A=A"), None);
        assert_eq!(b64_decode(b" A"), None);
        assert_eq!(b64_decode(b"-1"), None);
        // Overflow: 12 digits with a nonzero top digit
        assert_eq!(b64_decode(b"BAAAAAAAAAAA"), None);
    }

    #[test]
    fn test_encode_decode_large_offsets() {
        for val in [1u64 << 32, (1 << 40) + 12345, u64::MAX] {
            assert_eq!(b64_decode(b64_encode(val).as_bytes()), Some(val));
        }
    }

    // ===== split helper Tests =====

    #[test]
    fn test_rsplit_once() {
        assert_eq!(
            bs_rsplit_once(b"name with spaces\tB\tC", b'\t'),
            Some((b"name with spaces\tB" as &[u8], b"C" as &[u8]))
        );
        assert_eq!(bs_rsplit_once(b"nodelimiter", b'\t'), None);
        assert_eq!(
            bs_rsplit_once(b"key\t", b'\t'),
            Some((b"key" as &[u8], b"" as &[u8]))
        );
    }

    #[test]
    fn test_trim_newline() {
        assert_eq!(bs_trim_newline(b"line\n"), b"line");
        assert_eq!(bs_trim_newline(b"line\r\n"), b"line");
        assert_eq!(bs_trim_newline(b"line"), b"line");
    }
}
