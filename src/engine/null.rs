use super::RandomEngine;

/// Produces only zero bytes.
///
/// Carries no state, so a single process-wide instance, [`NULL_ENGINE`], is
/// handed out by reference.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NullEngine;

pub static NULL_ENGINE: NullEngine = NullEngine;

impl NullEngine {
    pub fn fill(&self, dest: &mut [u8]) {
        dest.fill(0);
    }
}

impl RandomEngine for NullEngine {
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.fill(dest);
    }
}

#[cfg(test)]
mod tests {
    use super::{NullEngine, NULL_ENGINE};
    use crate::engine::RandomEngine;

    #[test]
    fn test_zeroes() {
        let mut bytes = vec![0xa5_u8; 1000];
        NULL_ENGINE.fill(&mut bytes);
        assert!(bytes.iter().all(|b| *b == 0));
        assert_eq!(vec![0_u8; 33], NullEngine.random_bytes(33));
    }
}
