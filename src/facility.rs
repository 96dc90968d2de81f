use crate::{
    config::Configuration,
    engine::EngineHandle,
    entropy::{EntropySource, OsEntropy},
    factory::RandomEngineFactory,
    CryptoRandomError,
};
use std::sync::Arc;

/// Entry point of the crate: builds random engines and gives direct access
/// to the operating system randomness they are seeded from.
pub struct RandomFacility {
    factory: RandomEngineFactory,
    entropy: Arc<dyn EntropySource>,
}

impl RandomFacility {
    /// A facility backed by the operating system randomness
    #[must_use]
    pub fn new(default_configuration: Configuration) -> Self {
        Self::with_entropy_source(default_configuration, Arc::new(OsEntropy::new()))
    }

    #[must_use]
    pub fn with_entropy_source(
        default_configuration: Configuration,
        entropy: Arc<dyn EntropySource>,
    ) -> Self {
        Self {
            factory: RandomEngineFactory::new(default_configuration, entropy.clone()),
            entropy,
        }
    }

    #[must_use]
    pub fn default_configuration(&self) -> Configuration {
        self.factory.default_configuration()
    }

    #[must_use]
    pub fn factory(&self) -> &RandomEngineFactory {
        &self.factory
    }

    /// Number of seed bytes the engine described by `conf` requires
    #[must_use]
    pub fn seed_size(&self, conf: &Configuration) -> usize {
        conf.seed_size()
    }

    /// A self-seeded engine of the default configuration
    pub fn create_random_engine(&self) -> Result<EngineHandle, CryptoRandomError> {
        self.factory.create_default()
    }

    pub fn create_random_engine_with_configuration(
        &self,
        conf: Configuration,
    ) -> Result<EngineHandle, CryptoRandomError> {
        self.factory.create(conf)
    }

    pub fn create_random_engine_with_seed(
        &self,
        seed: &[u8],
    ) -> Result<EngineHandle, CryptoRandomError> {
        self.factory.create_with_seed(self.default_configuration(), seed)
    }

    pub fn create_random_engine_with_configuration_and_seed(
        &self,
        conf: Configuration,
        seed: &[u8],
    ) -> Result<EngineHandle, CryptoRandomError> {
        self.factory.create_with_seed(conf, seed)
    }

    /// Fill `dest` with entropy backed bytes, waiting as long as needed
    pub fn random_blocking(&self, dest: &mut [u8]) -> Result<(), CryptoRandomError> {
        self.entropy.random_blocking(dest)
    }

    /// Fill `dest` with pseudorandom bytes, waiting as long as needed
    pub fn urandom_blocking(&self, dest: &mut [u8]) -> Result<(), CryptoRandomError> {
        self.entropy.urandom_blocking(dest)
    }

    /// Returns the number of entropy backed bytes written to `dest`
    pub fn random_nonblocking(&self, dest: &mut [u8]) -> usize {
        self.entropy.random_nonblocking(dest)
    }

    /// Returns the number of pseudorandom bytes written to `dest`
    pub fn urandom_nonblocking(&self, dest: &mut [u8]) -> usize {
        self.entropy.urandom_nonblocking(dest)
    }
}

impl Default for RandomFacility {
    fn default() -> Self {
        Self::new(Configuration::default())
    }
}

impl std::fmt::Debug for RandomFacility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomFacility")
            .field("factory", &self.factory)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::RandomFacility;
    use crate::{
        config::{BufferMode, Configuration, CoreEngineKind},
        engine::{ChaCha20Engine, RandomEngine},
        entropy::tests::{CountingSource, FailingSource},
        CryptoRandomError,
    };
    use std::{sync::Arc, thread};

    #[test]
    fn test_default_engine() {
        let facility = RandomFacility::default();
        assert_eq!(Configuration::default(), facility.default_configuration());
        let mut engine = facility.create_random_engine().unwrap();
        assert_eq!(CoreEngineKind::Aes, engine.kind());
        assert!(!engine.is_buffered());
        assert_ne!(engine.random_bytes(32), engine.random_bytes(32));
    }

    #[test]
    fn test_seed_size() {
        let facility = RandomFacility::default();
        for kind in CoreEngineKind::ALL {
            let conf = Configuration::unbuffered(kind);
            assert_eq!(kind.seed_size(), facility.seed_size(&conf));
        }
    }

    #[test]
    fn test_configured_engines() {
        let conf = Configuration::new(CoreEngineKind::ChaCha20, BufferMode::Thread, 4096);
        let facility = RandomFacility::new(conf);
        let seed = [7_u8; 40];
        let mut engine = facility.create_random_engine_with_seed(&seed).unwrap();
        assert!(engine.is_buffered());
        assert_eq!(
            ChaCha20Engine::new(&seed).unwrap().random_bytes(10_000),
            engine.random_bytes(10_000)
        );

        let mut engine = facility
            .create_random_engine_with_configuration_and_seed(
                Configuration::unbuffered(CoreEngineKind::Null),
                &[],
            )
            .unwrap();
        assert_eq!(vec![0_u8; 10], engine.random_bytes(10));

        let engine = facility
            .create_random_engine_with_configuration(Configuration::unbuffered(
                CoreEngineKind::OsPassthrough,
            ))
            .unwrap();
        assert_eq!(CoreEngineKind::OsPassthrough, engine.kind());
    }

    #[test]
    fn test_shared_buffered_engine() {
        let facility = RandomFacility::default();
        let agent = Arc::new(
            facility
                .create_random_engine_with_configuration(Configuration::new(
                    CoreEngineKind::Aes,
                    BufferMode::Thread,
                    1 << 16,
                ))
                .unwrap()
                .into_buffered()
                .unwrap(),
        );
        let outputs: Vec<Vec<u8>> = (0..4)
            .map(|_| {
                let agent = agent.clone();
                thread::spawn(move || {
                    let mut bytes = vec![0_u8; 100_000];
                    agent.fill_bytes(&mut bytes);
                    bytes
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect();
        for (i, a) in outputs.iter().enumerate() {
            for b in &outputs[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_direct_entropy_access() {
        let facility = RandomFacility::default();
        let mut a = [0_u8; 32];
        let mut b = [0_u8; 32];
        facility.urandom_blocking(&mut a).unwrap();
        facility.random_blocking(&mut b).unwrap();
        assert_ne!(a, b);
        assert_eq!(32, facility.urandom_nonblocking(&mut a));
        assert!(facility.random_nonblocking(&mut a) <= 32);

        let source = Arc::new(CountingSource::default());
        let facility =
            RandomFacility::with_entropy_source(Configuration::default(), source.clone());
        assert_eq!(16, facility.random_nonblocking(&mut a[..16]));
        facility.urandom_blocking(&mut b[..8]).unwrap();
        assert_eq!(16, source.random_reads());
        assert_eq!(8, source.urandom_reads());
    }

    #[test]
    fn test_entropy_failure() {
        let facility =
            RandomFacility::with_entropy_source(Configuration::default(), Arc::new(FailingSource));
        let mut bytes = [0_u8; 8];
        assert!(matches!(
            facility.random_blocking(&mut bytes),
            Err(CryptoRandomError::EntropyError(_))
        ));
        assert_eq!(0, facility.urandom_nonblocking(&mut bytes));
        assert!(matches!(
            facility.create_random_engine(),
            Err(CryptoRandomError::SeedSelfGenerateError(_))
        ));
        // a caller supplied seed needs no entropy
        assert!(facility.create_random_engine_with_seed(&[0_u8; 32]).is_ok());
    }
}
