//! SNOW 2.0 stream cipher (Ekdahl and Johansson, SAC 2002).
//!
//! Kept so that streams pinned to it can be reproduced; prefer the AES or
//! ChaCha20 engines for anything new.
//!
//! Seeded engines run the [`Snow2Variant::Deployed`] FSM, the one existing
//! deployments of this engine produce their streams with. The published
//! cipher is available through [`Snow2Engine::with_key_iv`].
//!
//! The LFSR has 16 taps over GF(2^32) and is clocked 16 times per
//! generation, so the taps are updated in place without shifting and the
//! register is back at its origin after each 64 byte block.

use super::{BlockCache, RandomEngine, SNOW2_SEED_LENGTH};
use crate::CryptoRandomError;
use tracing::debug;
use zeroize::Zeroize;

pub const SEED_LENGTH: usize = SNOW2_SEED_LENGTH;
/// Key length used when seeding the engine
pub const KEY_LENGTH: usize = 32;
pub const IV_WORDS: usize = 4;
/// Bytes produced by one generation
pub const BUFFER_LENGTH: usize = 64;

const INIT_CLOCKS: usize = 32;

/// Multiplication in GF(2^8) reduced by `x^8 + poly`
const fn gf_mul(mut a: u8, mut b: u8, poly: u8) -> u8 {
    let mut product = 0;
    while b != 0 {
        if b & 1 != 0 {
            product ^= a;
        }
        let carry = a & 0x80 != 0;
        a <<= 1;
        if carry {
            a ^= poly;
        }
        b >>= 1;
    }
    product
}

const fn gf_pow(mut a: u8, mut e: u32, poly: u8) -> u8 {
    let mut result = 1;
    while e > 0 {
        if e & 1 != 0 {
            result = gf_mul(result, a, poly);
        }
        a = gf_mul(a, a, poly);
        e >>= 1;
    }
    result
}

/// AES field, `x^8 + x^4 + x^3 + x + 1`
const AES_POLY: u8 = 0x1b;
/// SNOW 2.0 field for `beta`, `x^8 + x^7 + x^5 + x^3 + 1`
const BETA_POLY: u8 = 0xa9;

const fn aes_sbox(x: u8) -> u8 {
    let b = if x == 0 { 0 } else { gf_pow(x, 254, AES_POLY) };
    b ^ b.rotate_left(1) ^ b.rotate_left(2) ^ b.rotate_left(3) ^ b.rotate_left(4) ^ 0x63
}

/// S-box followed by MixColumn, one table per input byte position
const fn mix_tables() -> [[u32; 256]; 4] {
    let mut t = [[0_u32; 256]; 4];
    let mut i = 0;
    while i < 256 {
        let s = aes_sbox(i as u8) as u32;
        let s2 = gf_mul(s as u8, 2, AES_POLY) as u32;
        let s3 = s2 ^ s;
        t[0][i] = (s3 << 24) | (s << 16) | (s << 8) | s2;
        t[1][i] = (s << 24) | (s << 16) | (s2 << 8) | s3;
        t[2][i] = (s << 24) | (s2 << 16) | (s3 << 8) | s;
        t[3][i] = (s2 << 24) | (s3 << 16) | (s << 8) | s;
        i += 1;
    }
    t
}

/// Products of every byte by the coefficients of `alpha` (or of its
/// inverse) expressed as powers of `beta`.
const fn alpha_table(exponents: [u32; 4]) -> [u32; 256] {
    let factors = [
        gf_pow(2, exponents[0], BETA_POLY),
        gf_pow(2, exponents[1], BETA_POLY),
        gf_pow(2, exponents[2], BETA_POLY),
        gf_pow(2, exponents[3], BETA_POLY),
    ];
    let mut table = [0_u32; 256];
    let mut c = 0;
    while c < 256 {
        table[c] = ((gf_mul(c as u8, factors[0], BETA_POLY) as u32) << 24)
            | ((gf_mul(c as u8, factors[1], BETA_POLY) as u32) << 16)
            | ((gf_mul(c as u8, factors[2], BETA_POLY) as u32) << 8)
            | gf_mul(c as u8, factors[3], BETA_POLY) as u32;
        c += 1;
    }
    table
}

static T: [[u32; 256]; 4] = mix_tables();
static ALPHA_MUL: [u32; 256] = alpha_table([23, 245, 48, 239]);
static ALPHA_INV_MUL: [u32; 256] = alpha_table([16, 39, 6, 64]);

#[inline(always)]
fn a_mul(w: u32) -> u32 {
    (w << 8) ^ ALPHA_MUL[(w >> 24) as usize]
}

#[inline(always)]
fn a_inv_mul(w: u32) -> u32 {
    (w >> 8) ^ ALPHA_INV_MUL[(w & 0xff) as usize]
}

/// How the FSM derives the new `r2` from `r1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Snow2Variant {
    /// SNOW 2.0 as published: table `i` is indexed by byte `i` of `r1`.
    Standard,
    /// The third table is indexed by byte 1 of `r1` instead of byte 2.
    Deployed,
}

#[inline(always)]
fn mix(w: u32, variant: Snow2Variant) -> u32 {
    let third = match variant {
        Snow2Variant::Standard => (w >> 16) & 0xff,
        Snow2Variant::Deployed => (w >> 8) & 0xff,
    };
    T[0][(w & 0xff) as usize]
        ^ T[1][((w >> 8) & 0xff) as usize]
        ^ T[2][third as usize]
        ^ T[3][(w >> 24) as usize]
}

fn be_word(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// LFSR taps and FSM registers
struct Snow2State {
    s: [u32; 16],
    r1: u32,
    r2: u32,
    variant: Snow2Variant,
}

impl Snow2State {
    fn new(
        key: &[u8],
        iv: &[u32; IV_WORDS],
        variant: Snow2Variant,
    ) -> Result<Self, CryptoRandomError> {
        let mut s = [0_u32; 16];
        match key.len() {
            16 => {
                for (i, word) in key.chunks_exact(4).enumerate() {
                    let k = be_word(word);
                    s[15 - i] = k;
                    s[11 - i] = !k;
                    s[7 - i] = k;
                    s[3 - i] = !k;
                }
            }
            32 => {
                for (i, word) in key.chunks_exact(4).enumerate() {
                    let k = be_word(word);
                    s[15 - i] = k;
                    s[7 - i] = !k;
                }
            }
            given => {
                return Err(CryptoRandomError::SizeError {
                    given,
                    expected: KEY_LENGTH,
                })
            }
        }
        s[15] ^= iv[0];
        s[12] ^= iv[1];
        s[10] ^= iv[2];
        s[9] ^= iv[3];

        let mut state = Self {
            s,
            r1: 0,
            r2: 0,
            variant,
        };
        for clock in 0..INIT_CLOCKS {
            state.clock_init(clock % 16);
        }
        Ok(state)
    }

    #[inline(always)]
    fn update_fsm(&mut self, i: usize) {
        let r1 = self.r2.wrapping_add(self.s[(i + 5) % 16]);
        self.r2 = mix(self.r1, self.variant);
        self.r1 = r1;
    }

    #[inline(always)]
    fn feedback(&self, i: usize) -> u32 {
        a_mul(self.s[i]) ^ self.s[(i + 2) % 16] ^ a_inv_mul(self.s[(i + 11) % 16])
    }

    /// Blank clocking: the FSM output is fed back into the LFSR
    fn clock_init(&mut self, i: usize) {
        let fsm_out = self.r1.wrapping_add(self.s[(i + 15) % 16]) ^ self.r2;
        self.s[i] = self.feedback(i) ^ fsm_out;
        self.update_fsm(i);
    }

    fn generate(&mut self, block: &mut [u8; BUFFER_LENGTH]) {
        for (i, out) in block.chunks_exact_mut(4).enumerate() {
            self.s[i] = self.feedback(i);
            self.update_fsm(i);
            let word = self.r1.wrapping_add(self.s[i]) ^ self.r2 ^ self.s[(i + 1) % 16];
            out.copy_from_slice(&word.to_le_bytes());
        }
    }
}

impl Drop for Snow2State {
    fn drop(&mut self) {
        self.s.zeroize();
        self.r1.zeroize();
        self.r2.zeroize();
    }
}

pub struct Snow2Engine {
    state: Snow2State,
    cache: BlockCache<BUFFER_LENGTH>,
}

impl Snow2Engine {
    /// Build the engine from a 256-bit key followed by the four IV words,
    /// each stored little-endian, running the [`Snow2Variant::Deployed`] FSM.
    ///
    /// Bytes past [`SEED_LENGTH`] are ignored.
    pub fn new(seed: &[u8]) -> Result<Self, CryptoRandomError> {
        if seed.len() < SEED_LENGTH {
            return Err(CryptoRandomError::SeedTooShort {
                given: seed.len(),
                expected: SEED_LENGTH,
            });
        }
        let mut iv = [0_u32; IV_WORDS];
        for (word, bytes) in iv
            .iter_mut()
            .zip(seed[KEY_LENGTH..SEED_LENGTH].chunks_exact(4))
        {
            *word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
        let engine = Self::with_variant(&seed[..KEY_LENGTH], &iv, Snow2Variant::Deployed);
        iv.zeroize();
        engine
    }

    /// Build the published SNOW 2.0 cipher from a 128 or 256-bit key, the
    /// key words being loaded big-endian.
    pub fn with_key_iv(key: &[u8], iv: &[u32; IV_WORDS]) -> Result<Self, CryptoRandomError> {
        Self::with_variant(key, iv, Snow2Variant::Standard)
    }

    pub fn with_variant(
        key: &[u8],
        iv: &[u32; IV_WORDS],
        variant: Snow2Variant,
    ) -> Result<Self, CryptoRandomError> {
        let state = Snow2State::new(key, iv, variant)?;
        debug!(
            "SNOW 2.0 random engine ({variant:?}) seeded with a {} bit key",
            key.len() * 8
        );
        Ok(Self {
            state,
            cache: BlockCache::new(),
        })
    }
}

impl RandomEngine for Snow2Engine {
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let Self { state, cache } = self;
        cache.fill(dest, |block| state.generate(block));
    }
}

impl std::fmt::Debug for Snow2Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snow2Engine").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{Snow2Engine, Snow2Variant, ALPHA_INV_MUL, ALPHA_MUL, SEED_LENGTH, T};
    use crate::{engine::tests::check_chunk_invariance, engine::RandomEngine, CryptoRandomError};
    use rand::{Rng, SeedableRng};
    use rand_hc::Hc128Rng;

    fn first_words(engine: &mut Snow2Engine) -> [u32; 5] {
        let bytes = engine.random_bytes(20);
        std::array::from_fn(|i| {
            let w = &bytes[4 * i..4 * i + 4];
            u32::from_le_bytes([w[0], w[1], w[2], w[3]])
        })
    }

    #[test]
    fn test_tables() {
        assert_eq!(0xa563_63c6, T[0][0]);
        assert_eq!(0x6363_c6a5, T[1][0]);
        assert_eq!(0x63c6_a563, T[2][0]);
        assert_eq!(0xc6a5_6363, T[3][0]);
        assert_eq!(0xe19f_cf13, ALPHA_MUL[1]);
        assert_eq!(0x180f_40cd, ALPHA_INV_MUL[1]);
        assert_eq!(0x5035_8897, ALPHA_MUL[0x80]);
        assert_eq!(0xe18d_0321, ALPHA_INV_MUL[0x80]);
    }

    #[test]
    fn test_vectors_128() {
        let mut key = [0_u8; 16];
        key[0] = 0x80;
        let mut engine = Snow2Engine::with_key_iv(&key, &[0; 4]).unwrap();
        assert_eq!(
            [0x8d59_0ae9, 0xa74a_7d05, 0x6dc9_ca74, 0xb72d_1a45, 0x99b0_a083],
            first_words(&mut engine)
        );

        let mut engine = Snow2Engine::with_key_iv(&[0xaa; 16], &[0; 4]).unwrap();
        assert_eq!(
            [0xe009_82f5, 0x25f0_2054, 0x2149_92d8, 0x706f_2b20, 0xda58_5e5b],
            first_words(&mut engine)
        );

        let mut engine = Snow2Engine::with_key_iv(&[0xaa; 16], &[1, 2, 3, 4]).unwrap();
        assert_eq!(
            [0xc355_385d, 0xb31d_6cbd, 0xf774_af53, 0x66c2_e877, 0x4dea_dac7],
            first_words(&mut engine)
        );
    }

    #[test]
    fn test_vectors_256() {
        let mut key = [0_u8; 32];
        key[0] = 0x80;
        let mut engine = Snow2Engine::with_key_iv(&key, &[0; 4]).unwrap();
        assert_eq!(
            [0x0b5b_cce2, 0x0323_e28e, 0x0fc2_0380, 0x9c66_ab73, 0xca35_a680],
            first_words(&mut engine)
        );

        let mut engine = Snow2Engine::with_key_iv(&[0xaa; 32], &[0; 4]).unwrap();
        assert_eq!(
            [0xd9cc_22fd, 0x8614_92d0, 0xae6f_43fb, 0x0f07_2012, 0x078c_5aee],
            first_words(&mut engine)
        );

        let mut engine = Snow2Engine::with_key_iv(&[0xaa; 32], &[1, 2, 3, 4]).unwrap();
        assert_eq!(
            [0x2926_1fce, 0x5ed0_3820, 0x1d6a_faf8, 0xb87e_74fe, 0xd49e_cb10],
            first_words(&mut engine)
        );
    }

    #[test]
    fn test_seeded_stream() {
        // stream produced by existing deployments for the seed 00 01 .. 2f
        let seed: Vec<u8> = (0_u8..48).collect();
        let mut engine = Snow2Engine::new(&seed).unwrap();
        assert_eq!(
            "c64f6818acea27ccad961b4145703d3f216b474fe014dd8e9d1910409149e8ea\
             11bb9f1f9d4e93ce5f4ecf99b928542a3c8e263b1d540d5a0203ab23064e7b0c\
             29709ca15227066bf4f4641d9636599e",
            hex::encode(engine.random_bytes(80))
        );
    }

    #[test]
    fn test_seed_layout() {
        let seed: Vec<u8> = (0_u8..48).collect();
        // the IV words are read little-endian
        let iv = [0x2322_2120, 0x2726_2524, 0x2b2a_2928, 0x2f2e_2d2c];
        let mut by_parts =
            Snow2Engine::with_variant(&seed[..32], &iv, Snow2Variant::Deployed).unwrap();
        let mut engine = Snow2Engine::new(&seed).unwrap();
        assert_eq!(engine.random_bytes(200), by_parts.random_bytes(200));

        // same key and IV under the published FSM
        let mut standard = Snow2Engine::with_key_iv(&seed[..32], &iv).unwrap();
        assert_eq!(
            "bf0a2d6413ea9bab68866554fa3f90850b0b62476fca9e1f6c05825e72644572\
             a67a345da5ae1ca20ff3acf22ac8e2a58b91823df5b94b7f52168f24fbaf60ae\
             f36bea342836d9979aaf2185e3e95bc0",
            hex::encode(standard.random_bytes(80))
        );
    }

    #[test]
    fn test_deployed_variant_256() {
        let mut key = [0_u8; 32];
        key[0] = 0x80;
        let mut engine = Snow2Engine::with_variant(&key, &[0; 4], Snow2Variant::Deployed).unwrap();
        assert_eq!(
            "a79979d4605855b11e8b3e262c18ab08519d1924",
            hex::encode(engine.random_bytes(20))
        );
    }

    #[test]
    fn test_chunk_invariance() {
        let mut seed = [0_u8; SEED_LENGTH];
        Hc128Rng::from_entropy().fill(&mut seed[..]);
        check_chunk_invariance(|| Snow2Engine::new(&seed).unwrap(), 3000);
    }

    #[test]
    fn test_seed() {
        assert!(matches!(
            Snow2Engine::new(&[0_u8; SEED_LENGTH - 1]),
            Err(CryptoRandomError::SeedTooShort {
                given: 47,
                expected: 48
            })
        ));
        assert!(matches!(
            Snow2Engine::with_key_iv(&[0_u8; 24], &[0; 4]),
            Err(CryptoRandomError::SizeError {
                given: 24,
                expected: 32
            })
        ));
    }
}
