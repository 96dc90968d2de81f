use crate::{
    buffer_agent::RandomBufferAgent,
    config::{BufferMode, Configuration, CoreEngineKind},
    engine::{AesEngine, ChaCha20Engine, CoreEngine, EngineHandle, PassthroughEngine, NULL_ENGINE},
    entropy::{EntropySource, OsEntropy},
    CryptoRandomError,
};
use std::sync::Arc;
use tracing::debug;
use zeroize::Zeroizing;

/// Builds random engines from a [`Configuration`] and a seed.
pub struct RandomEngineFactory {
    default_configuration: Configuration,
    entropy: Arc<dyn EntropySource>,
}

impl RandomEngineFactory {
    /// A factory seeding engines from `entropy` when no seed is supplied
    #[must_use]
    pub fn new(default_configuration: Configuration, entropy: Arc<dyn EntropySource>) -> Self {
        Self {
            default_configuration,
            entropy,
        }
    }

    #[must_use]
    pub fn with_os_entropy(default_configuration: Configuration) -> Self {
        Self::new(default_configuration, Arc::new(OsEntropy::new()))
    }

    #[must_use]
    pub fn default_configuration(&self) -> Configuration {
        self.default_configuration
    }

    /// Number of seed bytes an engine of that kind requires
    #[must_use]
    pub const fn required_seed_size(kind: CoreEngineKind) -> usize {
        kind.seed_size()
    }

    /// Build an engine for the default configuration, seeded from the
    /// entropy source
    pub fn create_default(&self) -> Result<EngineHandle, CryptoRandomError> {
        self.create(self.default_configuration)
    }

    /// Build an engine seeded from the entropy source.
    ///
    /// The seed is never replaced by weaker randomness: if the source fails,
    /// no engine is built.
    pub fn create(&self, conf: Configuration) -> Result<EngineHandle, CryptoRandomError> {
        let mut seed = Zeroizing::new(vec![0_u8; Self::required_seed_size(conf.core_engine)]);
        self.entropy
            .urandom_blocking(&mut seed)
            .map_err(|e| CryptoRandomError::SeedSelfGenerateError(e.to_string()))?;
        self.create_with_seed(conf, &seed)
    }

    /// Build an engine from a caller supplied seed.
    ///
    /// The seed must hold at least [`Self::required_seed_size`] bytes; the
    /// kinds that take no seed reject any seed bytes. Kinds compiled out of
    /// this build fail with `GeneratorNotSupported`.
    pub fn create_with_seed(
        &self,
        conf: Configuration,
        seed: &[u8],
    ) -> Result<EngineHandle, CryptoRandomError> {
        let kind = conf.core_engine;
        let required = Self::required_seed_size(kind);
        if seed.len() < required {
            return Err(CryptoRandomError::SeedTooShort {
                given: seed.len(),
                expected: required,
            });
        }
        if !kind.accepts_seed() && !seed.is_empty() {
            return Err(CryptoRandomError::SeedNotSupported(kind));
        }
        if !kind.is_supported() {
            return Err(CryptoRandomError::GeneratorNotSupported(kind));
        }

        let core = self.create_core(kind, seed)?;
        let handle = match conf.buffer_mode {
            BufferMode::None => EngineHandle::Direct(core),
            BufferMode::Thread => EngineHandle::Buffered {
                kind,
                agent: RandomBufferAgent::new(core, conf.buffer_size)?,
            },
        };
        debug!(
            "created {kind} random engine (buffer mode {})",
            conf.buffer_mode
        );
        Ok(handle)
    }

    fn create_core(
        &self,
        kind: CoreEngineKind,
        seed: &[u8],
    ) -> Result<CoreEngine, CryptoRandomError> {
        Ok(match kind {
            CoreEngineKind::Null => CoreEngine::Null(&NULL_ENGINE),
            CoreEngineKind::OsPassthrough => {
                CoreEngine::OsPassthrough(PassthroughEngine::new(self.entropy.clone()))
            }
            #[cfg(feature = "snow2")]
            CoreEngineKind::Snow2 => {
                CoreEngine::Snow2(Box::new(crate::engine::Snow2Engine::new(seed)?))
            }
            #[cfg(not(feature = "snow2"))]
            CoreEngineKind::Snow2 => return Err(CryptoRandomError::GeneratorNotSupported(kind)),
            CoreEngineKind::ChaCha20 => CoreEngine::ChaCha20(Box::new(ChaCha20Engine::new(seed)?)),
            CoreEngineKind::Aes => CoreEngine::Aes(Box::new(AesEngine::new(seed)?)),
        })
    }
}

impl Default for RandomEngineFactory {
    fn default() -> Self {
        Self::with_os_entropy(Configuration::default())
    }
}

impl std::fmt::Debug for RandomEngineFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomEngineFactory")
            .field("default_configuration", &self.default_configuration)
            .finish_non_exhaustive()
    }
}
