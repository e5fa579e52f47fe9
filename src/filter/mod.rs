//! Bloom filter used as the SSTable filter block.
//!
//! A compact bit array with `k` derived hash positions per key. Membership
//! tests never produce false negatives; the false positive rate is tuned at
//! construction from the expected item count and a target probability. The
//! serialized form is portable (little-endian, magic + version header) and
//! is embedded verbatim as the filter block of an SSTable.

use crate::error::{Error, Result};
use crate::encoding;

/// Serialized filter magic; the four bytes spell "VKBF" on disk.
pub const FILTER_MAGIC: u32 = 0x4642_4B56;

/// Serialized filter format version.
pub const FILTER_VERSION: u32 = 1;

/// Byte length of the serialized header preceding the bit array.
pub const FILTER_HEADER_LEN: usize = 24;

const SEED_H1: u64 = 0x243F_6A88_85A3_08D3;
const SEED_H2: u64 = 0x1319_8A2E_0370_7344;
const GOLDEN: u64 = 0x9E37_79B9_7F4A_7C15;

/// Bit-array membership structure sized from `(n, p)`.
pub struct BloomFilter {
    num_bits: u64,
    num_hashes: u32,
    bits: Vec<u8>,
}

impl BloomFilter {
    /// Creates a filter sized to meet `false_positive_rate` for
    /// `expected_items` insertions.
    ///
    /// Extreme probabilities are clamped to `(1e-9, 0.999999)`; both the bit
    /// count and hash count are clamped to at least one, so a filter for zero
    /// items is a single always-colliding bit rather than an error.
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        let num_bits = optimal_num_bits(expected_items, false_positive_rate);
        let num_hashes = optimal_num_hashes(expected_items, num_bits);
        let bits = vec![0u8; byte_len(num_bits)];
        Self {
            num_bits,
            num_hashes,
            bits,
        }
    }

    /// Inserts `key` by setting its `k` derived bit positions.
    pub fn add(&mut self, key: &[u8]) {
        let (h1, step) = self.probe_seed(key);
        let mut x = h1 % self.num_bits;
        for _ in 0..self.num_hashes {
            self.set_bit(x);
            x = x.wrapping_add(step) % self.num_bits;
        }
    }

    /// Tests membership: `false` means definitely absent, `true` means
    /// possibly present.
    pub fn might_contain(&self, key: &[u8]) -> bool {
        let (h1, step) = self.probe_seed(key);
        let mut x = h1 % self.num_bits;
        for _ in 0..self.num_hashes {
            if !self.get_bit(x) {
                return false;
            }
            x = x.wrapping_add(step) % self.num_bits;
        }
        true
    }

    /// Total number of bits (`m`).
    pub fn bit_size(&self) -> u64 {
        self.num_bits
    }

    /// Number of bytes backing the bit array.
    pub fn byte_size(&self) -> usize {
        self.bits.len()
    }

    /// Number of hash probes per key (`k`).
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Serializes the filter to a portable byte buffer:
    ///
    /// ```text
    /// [magic: u32][version: u32][num_bits: u64][k: u32][pad: u32 = 0][bits]
    /// ```
    ///
    /// All fields little-endian; the header is exactly 24 bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FILTER_HEADER_LEN + self.bits.len());
        encoding::put_fixed32(&mut out, FILTER_MAGIC);
        encoding::put_fixed32(&mut out, FILTER_VERSION);
        encoding::put_fixed64(&mut out, self.num_bits);
        encoding::put_fixed32(&mut out, self.num_hashes);
        encoding::put_fixed32(&mut out, 0);
        out.extend_from_slice(&self.bits);
        out
    }

    /// Reconstructs a filter from `serialize` output.
    ///
    /// The buffer must match the serialized format exactly: correct magic and
    /// version, non-zero `m` and `k`, and a total length of
    /// `24 + ceil(m / 8)` bytes.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FILTER_HEADER_LEN {
            return Err(Error::Truncated("bloom filter header"));
        }

        let magic = encoding::decode_fixed32(&bytes[0..]);
        let version = encoding::decode_fixed32(&bytes[4..]);
        let num_bits = encoding::decode_fixed64(&bytes[8..]);
        let num_hashes = encoding::decode_fixed32(&bytes[16..]);
        // bytes[20..24] is the pad field, ignored.

        if magic != FILTER_MAGIC || version != FILTER_VERSION {
            return Err(Error::BadMagicOrVersion("bloom filter"));
        }
        if num_bits == 0 || num_hashes == 0 {
            return Err(Error::InvalidParameters("bloom filter with m=0 or k=0"));
        }

        let needed = byte_len(num_bits);
        if bytes.len() != FILTER_HEADER_LEN + needed {
            return Err(Error::SizeMismatch);
        }

        Ok(Self {
            num_bits,
            num_hashes,
            bits: bytes[FILTER_HEADER_LEN..].to_vec(),
        })
    }

    /// Derives the double-hashing base position and stride for `key`.
    ///
    /// The stride is forced odd so every residue modulo `m` stays reachable
    /// even when `h2` has poor low-bit distribution.
    fn probe_seed(&self, key: &[u8]) -> (u64, u64) {
        let h1 = hash64(key, SEED_H1);
        let h2 = hash64(key, SEED_H2);
        (h1, (h2 << 1) | 1)
    }

    fn set_bit(&mut self, bit_index: u64) {
        let byte = (bit_index >> 3) as usize;
        self.bits[byte] |= 1u8 << (bit_index & 7);
    }

    fn get_bit(&self, bit_index: u64) -> bool {
        let byte = (bit_index >> 3) as usize;
        (self.bits[byte] >> (bit_index & 7)) & 1 == 1
    }
}

impl std::fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomFilter")
            .field("num_bits", &self.num_bits)
            .field("num_hashes", &self.num_hashes)
            .field("bytes", &self.bits.len())
            .finish()
    }
}

fn byte_len(num_bits: u64) -> usize {
    ((num_bits + 7) / 8) as usize
}

/// `m = ceil(-n * ln(p) / ln(2)^2)`, clamped to at least one bit.
fn optimal_num_bits(n: usize, p: f64) -> u64 {
    if n == 0 {
        return 1;
    }
    let p = p.clamp(1e-9, 0.999_999);
    let ln2 = std::f64::consts::LN_2;
    let m = (-(n as f64) * p.ln() / (ln2 * ln2)).ceil();
    (m as u64).max(1)
}

/// `k = round((m / n) * ln 2)`, clamped to at least one probe.
fn optimal_num_hashes(n: usize, m: u64) -> u32 {
    if n == 0 || m == 0 {
        return 1;
    }
    let k = ((m as f64 / n as f64) * std::f64::consts::LN_2).round();
    (k as u32).max(1)
}

/// Fast 64-bit hash (SplitMix64-style mixing) over arbitrary bytes.
///
/// Not cryptographic; chosen for speed and well-distributed bits. The `seed`
/// decorrelates the two base hashes used for double hashing, and the output
/// is fully deterministic for a given `(data, seed)` pair.
fn hash64(data: &[u8], seed: u64) -> u64 {
    let mut x = seed ^ GOLDEN.wrapping_add(data.len() as u64);

    let mut chunks = data.chunks_exact(8);
    for chunk in &mut chunks {
        let k = u64::from_le_bytes(chunk.try_into().unwrap());
        x = x.wrapping_add(k.wrapping_add(GOLDEN));
        x ^= x >> 30;
        x = x.wrapping_mul(0xBF58_476D_1CE4_E5B9);
        x ^= x >> 27;
        x = x.wrapping_mul(0x94D0_49BB_1331_11EB);
    }

    let mut tail: u64 = 0;
    for (i, &b) in chunks.remainder().iter().enumerate() {
        tail |= u64::from(b) << (8 * i);
    }
    x = x.wrapping_add(tail);

    x ^= x >> 30;
    x = x.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^= x >> 31;
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_keys(rng: &mut StdRng, count: usize) -> Vec<[u8; 8]> {
        (0..count).map(|_| rng.gen::<[u8; 8]>()).collect()
    }

    #[test]
    fn no_false_negatives() {
        let mut rng = StdRng::seed_from_u64(7);
        let keys = random_keys(&mut rng, 20_000);

        let mut bf = BloomFilter::new(keys.len(), 0.01);
        for key in &keys {
            bf.add(key);
        }
        for key in &keys {
            assert!(bf.might_contain(key));
        }
    }

    #[test]
    fn false_positive_rate_stays_near_target() {
        let mut rng = StdRng::seed_from_u64(42);
        let inserted: std::collections::HashSet<[u8; 8]> =
            random_keys(&mut rng, 20_000).into_iter().collect();

        let mut bf = BloomFilter::new(inserted.len(), 0.01);
        for key in &inserted {
            bf.add(key);
        }

        let mut false_positives = 0usize;
        let mut probes = 0usize;
        while probes < 20_000 {
            let candidate = rng.gen::<[u8; 8]>();
            if inserted.contains(&candidate) {
                continue;
            }
            probes += 1;
            if bf.might_contain(&candidate) {
                false_positives += 1;
            }
        }

        let fpr = false_positives as f64 / probes as f64;
        assert!(fpr <= 0.018, "measured fpr {fpr} exceeds 1.8x target");
    }

    #[test]
    fn serialize_round_trip_preserves_membership() {
        let mut bf = BloomFilter::new(100, 0.01);
        for key in [b"alpha".as_slice(), b"bravo", b"charlie"] {
            bf.add(key);
        }

        let bytes = bf.serialize();
        assert_eq!(bytes.len(), FILTER_HEADER_LEN + bf.byte_size());

        let restored = BloomFilter::deserialize(&bytes).unwrap();
        assert_eq!(restored.bit_size(), bf.bit_size());
        assert_eq!(restored.num_hashes(), bf.num_hashes());
        assert!(restored.might_contain(b"alpha"));
        assert!(restored.might_contain(b"bravo"));
        assert!(restored.might_contain(b"charlie"));
    }

    #[test]
    fn zero_expected_items_degenerates_to_single_bit() {
        let bf = BloomFilter::new(0, 0.01);
        assert_eq!(bf.bit_size(), 1);
        assert_eq!(bf.num_hashes(), 1);
    }

    #[test]
    fn deserialize_rejects_truncated_header() {
        let err = BloomFilter::deserialize(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, Error::Truncated(_)));
    }

    #[test]
    fn deserialize_rejects_bad_magic_and_version() {
        let bf = BloomFilter::new(10, 0.05);

        let mut bytes = bf.serialize();
        bytes[0] ^= 0xFF;
        assert!(matches!(
            BloomFilter::deserialize(&bytes),
            Err(Error::BadMagicOrVersion(_))
        ));

        let mut bytes = bf.serialize();
        bytes[4] = 9;
        assert!(matches!(
            BloomFilter::deserialize(&bytes),
            Err(Error::BadMagicOrVersion(_))
        ));
    }

    #[test]
    fn deserialize_rejects_zero_parameters() {
        let bf = BloomFilter::new(10, 0.05);

        let mut bytes = bf.serialize();
        bytes[8..16].fill(0); // num_bits = 0
        assert!(matches!(
            BloomFilter::deserialize(&bytes),
            Err(Error::InvalidParameters(_))
        ));

        let mut bytes = bf.serialize();
        bytes[16..20].fill(0); // num_hashes = 0
        assert!(matches!(
            BloomFilter::deserialize(&bytes),
            Err(Error::InvalidParameters(_))
        ));
    }

    #[test]
    fn deserialize_rejects_length_mismatch() {
        let bf = BloomFilter::new(100, 0.01);

        let mut short = bf.serialize();
        short.pop();
        assert!(matches!(
            BloomFilter::deserialize(&short),
            Err(Error::SizeMismatch)
        ));

        let mut long = bf.serialize();
        long.push(0);
        assert!(matches!(
            BloomFilter::deserialize(&long),
            Err(Error::SizeMismatch)
        ));
    }

    #[test]
    fn hash64_is_deterministic_and_seed_sensitive() {
        let a = hash64(b"some key", SEED_H1);
        assert_eq!(a, hash64(b"some key", SEED_H1));
        assert_ne!(a, hash64(b"some key", SEED_H2));
        assert_ne!(a, hash64(b"some kez", SEED_H1));
    }

    #[test]
    fn sizing_formulas_match_expected_magnitudes() {
        // n = 10000, p = 0.01 gives m ~ 9.585 bits/key and k ~ 7.
        let m = optimal_num_bits(10_000, 0.01);
        assert!((95_000..97_000).contains(&m), "m = {m}");
        assert_eq!(optimal_num_hashes(10_000, m), 7);
    }
}
