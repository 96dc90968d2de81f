use super::RandomEngine;
use crate::entropy::EntropySource;
use std::sync::Arc;
use tracing::error;

/// Forwards every request to the pseudorandom read of the entropy source.
///
/// The source is not expected to fail once it has been opened; if it does,
/// the process is aborted rather than handing out unfilled bytes.
pub struct PassthroughEngine {
    source: Arc<dyn EntropySource>,
}

impl PassthroughEngine {
    #[must_use]
    pub fn new(source: Arc<dyn EntropySource>) -> Self {
        Self { source }
    }
}

impl RandomEngine for PassthroughEngine {
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        if let Err(e) = self.source.urandom_blocking(dest) {
            error!("passthrough random engine: entropy source failed: {e}");
            std::process::abort();
        }
    }
}

impl std::fmt::Debug for PassthroughEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassthroughEngine").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::PassthroughEngine;
    use crate::{
        engine::RandomEngine,
        entropy::{tests::CountingSource, OsEntropy},
    };
    use std::sync::Arc;

    #[test]
    fn test_forwards_to_urandom() {
        let source = Arc::new(CountingSource::default());
        let mut engine = PassthroughEngine::new(source.clone());
        assert_eq!(vec![0_u8, 1, 2, 3, 4], engine.random_bytes(5));
        assert_eq!(vec![5_u8, 6], engine.random_bytes(2));
        assert_eq!(7, source.urandom_reads());
        assert_eq!(0, source.random_reads());
    }

    #[test]
    fn test_os_entropy() {
        let mut engine = PassthroughEngine::new(Arc::new(OsEntropy::new()));
        let a = engine.random_bytes(64);
        let b = engine.random_bytes(64);
        assert_ne!(a, b);
    }
}
