use serde::Deserialize;

use super::errors::EvictionError;

/// What the eviction daemon does when a delete fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionErrorPolicy {
    /// Stop the daemon and terminate the process.
    #[default]
    Fatal,
    /// Retry contention errors on the next tick, stop on anything else.
    RetryTransient,
    /// Log every error and retry on the next tick.
    RetryAll,
}

impl EvictionErrorPolicy {
    pub fn should_retry(&self, error: &EvictionError) -> bool {
        match self {
            EvictionErrorPolicy::Fatal => false,
            EvictionErrorPolicy::RetryTransient => {
                matches!(error, EvictionError::Store(e) if e.is_transient())
            }
            EvictionErrorPolicy::RetryAll => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nc_02_peer_store::StoreError;

    fn contention() -> EvictionError {
        EvictionError::Store(StoreError::Contention {
            store: "serving",
            reason: "busy".into(),
        })
    }

    fn backend() -> EvictionError {
        EvictionError::Store(StoreError::Backend {
            store: "serving",
            message: "disk gone".into(),
        })
    }

    #[test]
    fn test_fatal_never_retries() {
        assert!(!EvictionErrorPolicy::Fatal.should_retry(&contention()));
        assert!(!EvictionErrorPolicy::Fatal.should_retry(&backend()));
    }

    #[test]
    fn test_retry_transient_only_retries_contention() {
        let policy = EvictionErrorPolicy::RetryTransient;
        assert!(policy.should_retry(&contention()));
        assert!(!policy.should_retry(&backend()));
        assert!(!policy.should_retry(&EvictionError::Task("join".into())));
    }

    #[test]
    fn test_retry_all() {
        assert!(EvictionErrorPolicy::RetryAll.should_retry(&backend()));
    }

    #[test]
    fn test_default_is_fatal() {
        assert_eq!(EvictionErrorPolicy::default(), EvictionErrorPolicy::Fatal);
    }
}
