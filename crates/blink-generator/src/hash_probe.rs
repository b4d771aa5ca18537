use crate::Generator;
use blink_core::shortcode::{ALPHABET, SHORT_CODE_LENGTH};
use blink_core::ShortCode;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const BASE: u64 = ALPHABET.len() as u64;

/// Derives short codes from a hash of the long URL, resolving collisions
/// with quadratic probing.
///
/// `h(url, i) = fnv1a64(url) + (i + i^2) / 2  (mod 2^64)`
///
/// The probed value is written in base 62, least significant digit first,
/// keeping only the low [`SHORT_CODE_LENGTH`] digits. No shared counter is
/// involved, so any number of instances agree on the candidate sequence for
/// a given URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashProbeGenerator;

impl HashProbeGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Generator for HashProbeGenerator {
    fn generate(&self, long_url: &str, offset: u32) -> ShortCode {
        let value = fnv1a_64(long_url.as_bytes()).wrapping_add(quadratic_probe(offset));
        encode_base62(value)
    }
}

/// 64-bit FNV-1a.
fn fnv1a_64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Triangular numbers: 0, 1, 3, 6, 10, ...
fn quadratic_probe(offset: u32) -> u64 {
    let offset = u64::from(offset);
    (offset + offset * offset) / 2
}

/// Digits beyond the code length are discarded.
fn encode_base62(mut value: u64) -> ShortCode {
    let mut code = String::with_capacity(SHORT_CODE_LENGTH);
    for _ in 0..SHORT_CODE_LENGTH {
        code.push(char::from(ALPHABET[(value % BASE) as usize]));
        value /= BASE;
    }
    ShortCode::new_unchecked(code)
}
