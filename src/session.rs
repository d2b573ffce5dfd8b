use std::sync::{Arc, Mutex, MutexGuard};

use crate::api::{ApiError, Backend, SessionId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to initialize session: {0}")]
pub struct SessionInitError(#[from] pub ApiError);

#[derive(Debug, Default)]
struct Slot {
    id: Option<SessionId>,
    /// Bumped on every reset; an init started under an older epoch is not stored.
    epoch: u64,
}

/// Holds the backend session id for the lifetime of the running client.
///
/// The id is kept in memory only: a new process starts without one. The lock
/// only guards reading and writing the cached id, never the network call, so a
/// reset never waits behind an init that has not answered.
#[derive(Debug, Default, Clone)]
pub struct SessionStore {
    slot: Arc<Mutex<Slot>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        // The guarded data is a plain id, so a poisoned lock is still usable.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[allow(dead_code)]
    pub fn current(&self) -> Option<SessionId> {
        self.slot().id.clone()
    }

    pub async fn get_or_create(&self, backend: &dyn Backend) -> Result<SessionId, SessionInitError> {
        let epoch = {
            let slot = self.slot();
            if let Some(id) = &slot.id {
                return Ok(id.clone());
            }
            slot.epoch
        };

        let id = backend.init_session().await?;

        let mut slot = self.slot();
        if slot.epoch != epoch {
            tracing::debug!(session = %id, "session initialized after reset; not cached");
            return Ok(id);
        }
        if let Some(existing) = &slot.id {
            return Ok(existing.clone());
        }
        tracing::info!(session = %id, "session initialized");
        slot.id = Some(id.clone());
        Ok(id)
    }

    pub fn reset(&self) {
        let mut slot = self.slot();
        slot.epoch += 1;
        if let Some(id) = slot.id.take() {
            tracing::info!(session = %id, "session discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ChatAnswer, FilePart, UploadResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingBackend {
        inits: AtomicUsize,
        fail: bool,
    }

    impl CountingBackend {
        fn new(fail: bool) -> Self {
            CountingBackend {
                inits: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl Backend for CountingBackend {
        async fn init_session(&self) -> Result<SessionId, ApiError> {
            let n = self.inits.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ApiError::Transport("connection refused".to_string()))
            } else {
                Ok(SessionId::new(format!("session-{n}")))
            }
        }

        async fn upload_files(&self, _: &SessionId, _: &[FilePart]) -> Result<UploadResult, ApiError> {
            unreachable!("not used by the session store")
        }

        async fn send_message(&self, _: &SessionId, _: &str) -> Result<ChatAnswer, ApiError> {
            unreachable!("not used by the session store")
        }
    }

    #[tokio::test]
    async fn test_creates_once_then_reuses() {
        let backend = CountingBackend::new(false);
        let store = SessionStore::new();

        let first = store.get_or_create(&backend).await.unwrap();
        let second = store.get_or_create(&backend).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.inits.load(Ordering::SeqCst), 1);
        assert_eq!(store.current(), Some(first.clone()));
    }

    #[tokio::test]
    async fn test_reset_forces_new_session() {
        let backend = CountingBackend::new(false);
        let store = SessionStore::new();

        let first = store.get_or_create(&backend).await.unwrap();
        store.reset();
        assert!(store.current().is_none());

        let second = store.get_or_create(&backend).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(backend.inits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_is_not_retried_or_stored() {
        let backend = CountingBackend::new(true);
        let store = SessionStore::new();

        let err = store.get_or_create(&backend).await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to initialize session"));
        assert!(store.current().is_none());
        assert_eq!(backend.inits.load(Ordering::SeqCst), 1);
    }

    /// Never answers its first init; later inits succeed.
    struct StalledFirstInit {
        inits: AtomicUsize,
    }

    #[async_trait]
    impl Backend for StalledFirstInit {
        async fn init_session(&self) -> Result<SessionId, ApiError> {
            let n = self.inits.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                std::future::pending::<()>().await;
            }
            Ok(SessionId::new(format!("session-{n}")))
        }

        async fn upload_files(&self, _: &SessionId, _: &[FilePart]) -> Result<UploadResult, ApiError> {
            unreachable!("not used by the session store")
        }

        async fn send_message(&self, _: &SessionId, _: &str) -> Result<ChatAnswer, ApiError> {
            unreachable!("not used by the session store")
        }
    }

    #[tokio::test]
    async fn test_reset_does_not_wait_for_unanswered_init() {
        let backend = Arc::new(StalledFirstInit {
            inits: AtomicUsize::new(0),
        });
        let store = SessionStore::new();

        let stalled = {
            let store = store.clone();
            let backend = backend.clone();
            tokio::spawn(async move { store.get_or_create(backend.as_ref()).await })
        };
        while backend.inits.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        store.reset();
        let fresh = tokio::time::timeout(Duration::from_secs(2), store.get_or_create(backend.as_ref()))
            .await
            .expect("new session should not wait behind the stalled init")
            .unwrap();

        assert_eq!(fresh, SessionId::new("session-1"));
        assert_eq!(store.current(), Some(fresh));
        assert!(!stalled.is_finished());
        stalled.abort();
    }

    struct GatedBackend {
        inits: AtomicUsize,
        gate: tokio::sync::Notify,
    }

    #[async_trait]
    impl Backend for GatedBackend {
        async fn init_session(&self) -> Result<SessionId, ApiError> {
            let n = self.inits.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(SessionId::new(format!("session-{n}")))
        }

        async fn upload_files(&self, _: &SessionId, _: &[FilePart]) -> Result<UploadResult, ApiError> {
            unreachable!("not used by the session store")
        }

        async fn send_message(&self, _: &SessionId, _: &str) -> Result<ChatAnswer, ApiError> {
            unreachable!("not used by the session store")
        }
    }

    #[tokio::test]
    async fn test_init_finishing_after_reset_is_not_cached() {
        let backend = Arc::new(GatedBackend {
            inits: AtomicUsize::new(0),
            gate: tokio::sync::Notify::new(),
        });
        let store = SessionStore::new();

        let in_flight = {
            let store = store.clone();
            let backend = backend.clone();
            tokio::spawn(async move { store.get_or_create(backend.as_ref()).await })
        };
        while backend.inits.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        store.reset();
        backend.gate.notify_one();

        let late = in_flight.await.unwrap().unwrap();
        assert_eq!(late, SessionId::new("session-0"));
        assert!(store.current().is_none());
    }
}
