//! ChaCha20 keystream generator working on four blocks at once.
//!
//! The 16 state words are held as 4-lane vectors: lane `l` computes the
//! block for counter `c + l`. Output is written in lane-interleaved order,
//! word `w` of lane `l` landing at word index `4 * w + l`, so the stream is
//! not the one of a strict RFC 8439 single-block implementation. Each output
//! word is still a ChaCha20 keystream word of the expected block.
//!
//! The block counter uses 64 bits (state words 12 and 13) and the nonce the
//! remaining two words.

use super::{BlockCache, RandomEngine};
use crate::CryptoRandomError;
use tracing::debug;
use zeroize::Zeroize;

pub const KEY_LENGTH: usize = 32;
pub const NONCE_LENGTH: usize = 8;
pub const SEED_LENGTH: usize = KEY_LENGTH + NONCE_LENGTH;

/// Number of blocks computed in parallel
const LANES: usize = 4;
/// Bytes produced by one generation
pub const BUFFER_LENGTH: usize = LANES * 64;

/// `"expand 32-byte k"` as little-endian words
const CONSTANTS: [u32; 4] = [0x6170_7865, 0x3320_646e, 0x7962_2d32, 0x6b20_6574];

type Lanes = [u32; LANES];

#[inline(always)]
fn quarter_round(x: &mut [Lanes; 16], a: usize, b: usize, c: usize, d: usize) {
    for l in 0..LANES {
        x[a][l] = x[a][l].wrapping_add(x[b][l]);
        x[d][l] = (x[d][l] ^ x[a][l]).rotate_left(16);

        x[c][l] = x[c][l].wrapping_add(x[d][l]);
        x[b][l] = (x[b][l] ^ x[c][l]).rotate_left(12);

        x[a][l] = x[a][l].wrapping_add(x[b][l]);
        x[d][l] = (x[d][l] ^ x[a][l]).rotate_left(8);

        x[c][l] = x[c][l].wrapping_add(x[d][l]);
        x[b][l] = (x[b][l] ^ x[c][l]).rotate_left(7);
    }
}

/// 20 rounds on all lanes
fn rounds(x: &mut [Lanes; 16]) {
    for _ in 0..10 {
        quarter_round(x, 0, 4, 8, 12);
        quarter_round(x, 1, 5, 9, 13);
        quarter_round(x, 2, 6, 10, 14);
        quarter_round(x, 3, 7, 11, 15);

        quarter_round(x, 0, 5, 10, 15);
        quarter_round(x, 1, 6, 11, 12);
        quarter_round(x, 2, 7, 8, 13);
        quarter_round(x, 3, 4, 9, 14);
    }
}

fn le_words<const W: usize>(bytes: &[u8]) -> [u32; W] {
    std::array::from_fn(|i| {
        u32::from_le_bytes([
            bytes[4 * i],
            bytes[4 * i + 1],
            bytes[4 * i + 2],
            bytes[4 * i + 3],
        ])
    })
}

pub struct ChaCha20Engine {
    state: [u32; 16],
    cache: BlockCache<BUFFER_LENGTH>,
}

impl ChaCha20Engine {
    /// Build the engine from 32 key bytes followed by 8 nonce bytes.
    ///
    /// Bytes past [`SEED_LENGTH`] are ignored.
    pub fn new(seed: &[u8]) -> Result<Self, CryptoRandomError> {
        if seed.len() < SEED_LENGTH {
            return Err(CryptoRandomError::SeedTooShort {
                given: seed.len(),
                expected: SEED_LENGTH,
            });
        }
        let mut state = [0_u32; 16];
        state[..4].copy_from_slice(&CONSTANTS);
        state[4..12].copy_from_slice(&le_words::<8>(&seed[..KEY_LENGTH]));
        state[14..].copy_from_slice(&le_words::<2>(&seed[KEY_LENGTH..SEED_LENGTH]));
        debug!("ChaCha20 random engine seeded");
        Ok(Self {
            state,
            cache: BlockCache::new(),
        })
    }

    fn counter(&self) -> u64 {
        u64::from(self.state[12]) | (u64::from(self.state[13]) << 32)
    }

    #[cfg(test)]
    pub(crate) fn with_counter(seed: &[u8], counter: u64) -> Result<Self, CryptoRandomError> {
        let mut engine = Self::new(seed)?;
        engine.state[12] = counter as u32;
        engine.state[13] = (counter >> 32) as u32;
        Ok(engine)
    }

    fn generate(state: &mut [u32; 16], block: &mut [u8; BUFFER_LENGTH]) {
        let counter = u64::from(state[12]) | (u64::from(state[13]) << 32);
        let mut input: [Lanes; 16] = std::array::from_fn(|w| [state[w]; LANES]);
        for (l, offset) in (0..LANES as u64).enumerate() {
            let lane_counter = counter.wrapping_add(offset);
            input[12][l] = lane_counter as u32;
            input[13][l] = (lane_counter >> 32) as u32;
        }

        let mut x = input;
        rounds(&mut x);

        for (w, (words, initial)) in x.iter().zip(&input).enumerate() {
            for l in 0..LANES {
                let at = 4 * (LANES * w + l);
                let word = words[l].wrapping_add(initial[l]);
                block[at..at + 4].copy_from_slice(&word.to_le_bytes());
            }
        }
        x.zeroize();
        input.zeroize();

        let next = counter.wrapping_add(LANES as u64);
        state[12] = next as u32;
        state[13] = (next >> 32) as u32;
    }
}

impl RandomEngine for ChaCha20Engine {
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let Self { state, cache } = self;
        cache.fill(dest, |block| Self::generate(state, block));
    }
}

impl Drop for ChaCha20Engine {
    fn drop(&mut self) {
        self.state.zeroize();
    }
}

impl std::fmt::Debug for ChaCha20Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaCha20Engine")
            .field("counter", &self.counter())
            .finish_non_exhaustive()
    }
}
