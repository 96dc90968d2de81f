//! Forward secure AES-128-CTR generator.
//!
//! Two CTR keystreams over a zero plaintext are chained. The outer one is
//! keyed once from the seed and only produces key material: each reseed
//! takes its next 32 bytes as the key and initial counter block of the inner
//! one, which produces the output 8 blocks at a time.
//!
//! The inner key is replaced after [`RESEED_INTERVAL_BLOCKS`] AES blocks,
//! which keeps the advantage of a PRP/PRF distinguisher on a single key
//! below `(2^24)^2 / 2^128 = 2^-80`. Once the inner state has been replaced,
//! it reveals nothing of the output produced under earlier inner keys.

use super::{BlockCache, RandomEngine};
use crate::CryptoRandomError;
use aes::{
    cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit},
    Aes128, Block,
};
use tracing::{debug, trace};
use zeroize::{Zeroize, Zeroizing};

pub const KEY_LENGTH: usize = 16;
pub const IV_LENGTH: usize = 16;
pub const SEED_LENGTH: usize = KEY_LENGTH + IV_LENGTH;

const BLOCK_LENGTH: usize = 16;
/// AES blocks encrypted per generation
const GROUP_BLOCKS: usize = 8;
/// Bytes produced by one generation
pub const BUFFER_LENGTH: usize = GROUP_BLOCKS * BLOCK_LENGTH;

/// Number of AES blocks produced under one inner key
pub const RESEED_INTERVAL_BLOCKS: u64 = 1 << 24;

/// AES-128 in counter mode, the counter block being a big-endian 128-bit
/// integer.
struct Ctr {
    cipher: Aes128,
    counter: u128,
}

impl Ctr {
    fn new(key: &[u8], iv: &[u8]) -> Self {
        let mut counter = [0_u8; BLOCK_LENGTH];
        counter.copy_from_slice(iv);
        let ctr = Self {
            cipher: Aes128::new(GenericArray::from_slice(key)),
            counter: u128::from_be_bytes(counter),
        };
        counter.zeroize();
        ctr
    }

    /// Write the keystream into `out`, whose length must be a multiple of
    /// the AES block length.
    fn keystream(&mut self, out: &mut [u8]) {
        debug_assert_eq!(0, out.len() % BLOCK_LENGTH);
        let mut blocks = [Block::default(); GROUP_BLOCKS];
        for group in out.chunks_mut(BUFFER_LENGTH) {
            let blocks = &mut blocks[..group.len() / BLOCK_LENGTH];
            for block in blocks.iter_mut() {
                block.copy_from_slice(&self.counter.to_be_bytes());
                self.counter = self.counter.wrapping_add(1);
            }
            self.cipher.encrypt_blocks(blocks);
            for (dst, block) in group.chunks_exact_mut(BLOCK_LENGTH).zip(blocks.iter()) {
                dst.copy_from_slice(block);
            }
        }
        for block in &mut blocks {
            block.as_mut_slice().zeroize();
        }
    }

    /// Key a new generator from the next 32 bytes of this one
    fn derive(&mut self) -> Self {
        let mut material = Zeroizing::new([0_u8; SEED_LENGTH]);
        self.keystream(&mut material[..]);
        Self::new(&material[..KEY_LENGTH], &material[KEY_LENGTH..])
    }
}

impl Drop for Ctr {
    fn drop(&mut self) {
        self.counter.zeroize();
    }
}

/// The two chained keystreams and the reseeding bookkeeping
struct DualCtr {
    outer: Ctr,
    inner: Ctr,
    /// AES blocks produced under the current inner key
    inner_blocks: u64,
    reseed_interval: u64,
}

impl DualCtr {
    fn generate(&mut self, block: &mut [u8; BUFFER_LENGTH]) {
        if self.inner_blocks >= self.reseed_interval {
            trace!(
                "AES random engine reseeding after {} blocks",
                self.inner_blocks
            );
            self.inner = self.outer.derive();
            self.inner_blocks = 0;
        }
        self.inner.keystream(block);
        self.inner_blocks += GROUP_BLOCKS as u64;
    }
}

pub struct AesEngine {
    ctr: DualCtr,
    cache: BlockCache<BUFFER_LENGTH>,
}

impl AesEngine {
    /// Build the engine from a 16 byte AES key followed by a 16 byte
    /// initial counter block.
    ///
    /// Bytes past [`SEED_LENGTH`] are ignored.
    pub fn new(seed: &[u8]) -> Result<Self, CryptoRandomError> {
        Self::with_reseed_interval(seed, RESEED_INTERVAL_BLOCKS)
    }

    pub(crate) fn with_reseed_interval(
        seed: &[u8],
        reseed_interval: u64,
    ) -> Result<Self, CryptoRandomError> {
        if seed.len() < SEED_LENGTH {
            return Err(CryptoRandomError::SeedTooShort {
                given: seed.len(),
                expected: SEED_LENGTH,
            });
        }
        let mut outer = Ctr::new(&seed[..KEY_LENGTH], &seed[KEY_LENGTH..SEED_LENGTH]);
        let inner = outer.derive();
        debug!("AES random engine seeded, reseeding every {reseed_interval} blocks");
        Ok(Self {
            ctr: DualCtr {
                outer,
                inner,
                inner_blocks: 0,
                reseed_interval,
            },
            cache: BlockCache::new(),
        })
    }
}

impl RandomEngine for AesEngine {
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let Self { ctr, cache } = self;
        cache.fill(dest, |block| ctr.generate(block));
    }
}

impl std::fmt::Debug for AesEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesEngine")
            .field("inner_blocks", &self.ctr.inner_blocks)
            .field("reseed_interval", &self.ctr.reseed_interval)
            .finish_non_exhaustive()
    }
}
