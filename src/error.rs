use crate::config::CoreEngineKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoRandomError {
    #[error("Random engine {0} is not supported by this build")]
    GeneratorNotSupported(CoreEngineKind),
    #[error("Out of memory while building the random engine")]
    OutOfMemory,
    #[error("Random engine construction failed: {0}")]
    OtherConstructionError(String),
    #[error("Seed too short: {given} given should be at least {expected}")]
    SeedTooShort { given: usize, expected: usize },
    #[error("Random engine {0} does not accept a seed")]
    SeedNotSupported(CoreEngineKind),
    #[error("Failed to self-generate a seed: {0}")]
    SeedSelfGenerateError(String),
    #[error("Entropy source failure: {0}")]
    EntropyError(#[from] std::io::Error),
    #[error("Wrong size: {given} given should be {expected}")]
    SizeError { given: usize, expected: usize },
    #[error("Failed to convert: {0}")]
    ConversionError(String),
}

impl From<std::collections::TryReserveError> for CryptoRandomError {
    fn from(_: std::collections::TryReserveError) -> Self {
        CryptoRandomError::OutOfMemory
    }
}
