//! CRC-32C (Castagnoli, RFC 3720 / iSCSI) checksum primitive.
//!
//! The engine calls this from three places — AOF record footers, the RDB
//! trailer, and their respective verifiers — so it is kept as one small
//! wrapper rather than calling the `crc32c` crate directly from each site.

/// Compute the Castagnoli CRC-32 of `bytes`, continuing from `seed`.
///
/// Every caller in this crate passes `seed = 0`; the parameter exists so the
/// primitive matches the streaming-update form the spec names, and so a
/// caller who does want to extend an existing running checksum can.
#[must_use]
pub fn crc32c(seed: u32, bytes: &[u8]) -> u32 {
    crc32c::crc32c_append(seed, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_digits() {
        assert_eq!(crc32c(0, b"123456789"), 0xE306_9283);
    }

    #[test]
    fn vector_hello_world() {
        assert_eq!(crc32c(0, b"hello world"), 0xC994_65AA);
    }

    #[test]
    fn empty_input_is_seed() {
        assert_eq!(crc32c(0, b""), 0);
    }

    #[test]
    fn chaining_seed_matches_concatenation() {
        let whole = crc32c(0, b"123456789hello world");
        let chained = crc32c(crc32c(0, b"123456789"), b"hello world");
        assert_eq!(whole, chained);
    }
}
