//! In-memory storage with TTL expiration of pending registrations.

use crate::error::StoreError;
use crate::store::RegistrationStore;
use crate::types::{PendingRegistration, StoreConfig, VerifiedIdentity};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

#[derive(Default)]
struct Regions {
    pending: RwLock<HashMap<String, PendingRegistration>>,
    identities: RwLock<HashMap<String, VerifiedIdentity>>,
}

/// In-memory registration store.
///
/// Nothing survives a restart. Expired pending records are hidden from reads
/// immediately and physically removed by a periodic sweep.
#[derive(Clone)]
pub struct MemoryStore {
    regions: Arc<Regions>,
}

impl MemoryStore {
    /// Create a new in-memory store.
    ///
    /// Spawns a background task that sweeps expired pending records every
    /// `sweep_interval`. The task stops once the last handle is dropped.
    pub fn new(config: StoreConfig, sweep_interval: Duration) -> Self {
        let store = Self {
            regions: Arc::new(Regions::default()),
        };

        let regions = Arc::downgrade(&store.regions);
        tokio::spawn(async move {
            sweep_loop(regions, sweep_interval).await;
        });

        info!(
            pending_region = %config.pending_region,
            identity_region = %config.identity_region,
            locality = ?config.locality,
            "In-memory registration store initialized (sweep_interval={:?})",
            sweep_interval
        );

        store
    }

    /// Remove every expired pending record. Returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        sweep(&self.regions).await
    }

    /// Number of pending records physically held, expired or not.
    pub async fn pending_count(&self) -> usize {
        self.regions.pending.read().await.len()
    }

    /// Number of verified identities.
    pub async fn identity_count(&self) -> usize {
        self.regions.identities.read().await.len()
    }
}

async fn sweep_loop(regions: Weak<Regions>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;

        let Some(regions) = regions.upgrade() else {
            debug!("Registration store dropped, stopping sweep");
            return;
        };

        let removed = sweep(&regions).await;
        if removed > 0 {
            debug!("Swept {} expired pending registrations", removed);
        }
    }
}

async fn sweep(regions: &Regions) -> usize {
    let now = Utc::now();
    let mut pending = regions.pending.write().await;
    let before = pending.len();
    pending.retain(|_, record| !record.is_expired_at(now));
    before - pending.len()
}

#[async_trait]
impl RegistrationStore for MemoryStore {
    #[instrument(skip(self))]
    async fn get_pending(&self, phone: &str) -> Result<Option<PendingRegistration>, StoreError> {
        let pending = self.regions.pending.read().await;
        Ok(pending.get(phone).filter(|r| !r.is_expired()).cloned())
    }

    #[instrument(skip(self, record), fields(phone = %record.phone))]
    async fn put_pending(&self, record: PendingRegistration) -> Result<(), StoreError> {
        let mut pending = self.regions.pending.write().await;
        if pending.insert(record.phone.clone(), record).is_some() {
            debug!("Replaced existing pending registration");
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_pending(&self, phone: &str) -> Result<bool, StoreError> {
        let mut pending = self.regions.pending.write().await;
        Ok(pending.remove(phone).is_some())
    }

    #[instrument(skip(self, expected), fields(phone = %expected.phone))]
    async fn consume_pending(&self, expected: &PendingRegistration) -> Result<bool, StoreError> {
        let mut pending = self.regions.pending.write().await;
        match pending.get(&expected.phone) {
            Some(current) if current == expected && !current.is_expired() => {
                pending.remove(&expected.phone);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    #[instrument(skip(self))]
    async fn get_identity(&self, phone: &str) -> Result<Option<VerifiedIdentity>, StoreError> {
        let identities = self.regions.identities.read().await;
        Ok(identities.get(phone).cloned())
    }

    #[instrument(skip(self, record), fields(phone = %record.phone))]
    async fn put_identity(&self, record: VerifiedIdentity) -> Result<(), StoreError> {
        let mut identities = self.regions.identities.write().await;
        identities.insert(record.phone.clone(), record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn store() -> MemoryStore {
        MemoryStore::new(StoreConfig::default(), Duration::from_secs(3600))
    }

    fn identity(phone: &str, key: &str) -> VerifiedIdentity {
        VerifiedIdentity {
            phone: phone.into(),
            identity_key: key.into(),
            signed_pre_key: "spk".into(),
            signature: "sig".into(),
            one_time_keys: vec!["otk1".into(), "otk2".into()],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_put_and_get_pending() {
        let store = store();
        let record = PendingRegistration::new("+15551234567", "a2V5", 123456, ChronoDuration::hours(1));

        store.put_pending(record.clone()).await.unwrap();

        let fetched = store.get_pending("+15551234567").await.unwrap();
        assert_eq!(fetched, Some(record));
        assert!(store.get_pending("+15550000000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_pending_overwrites() {
        let store = store();
        let first = PendingRegistration::new("+15551234567", "a2V5", 111111, ChronoDuration::hours(1));
        let second = PendingRegistration::new("+15551234567", "b3R0", 222222, ChronoDuration::hours(1));

        store.put_pending(first).await.unwrap();
        store.put_pending(second.clone()).await.unwrap();

        assert_eq!(store.get_pending("+15551234567").await.unwrap(), Some(second));
        assert_eq!(store.pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_expired_pending_is_hidden_before_sweep() {
        let store = store();
        let record = PendingRegistration::new("+15551234567", "a2V5", 123456, ChronoDuration::milliseconds(-1));

        store.put_pending(record.clone()).await.unwrap();

        // Physically present, logically absent
        assert_eq!(store.pending_count().await, 1);
        assert!(store.get_pending("+15551234567").await.unwrap().is_none());
        assert!(!store.consume_pending(&record).await.unwrap());
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let store = store();
        store
            .put_pending(PendingRegistration::new("+15550000001", "a2V5", 111111, ChronoDuration::milliseconds(-1)))
            .await
            .unwrap();
        store
            .put_pending(PendingRegistration::new("+15550000002", "a2V5", 222222, ChronoDuration::hours(1)))
            .await
            .unwrap();

        assert_eq!(store.sweep_expired().await, 1);
        assert_eq!(store.pending_count().await, 1);
        assert!(store.get_pending("+15550000002").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_background_sweep() {
        let store = MemoryStore::new(StoreConfig::default(), Duration::from_millis(20));
        store
            .put_pending(PendingRegistration::new("+15551234567", "a2V5", 123456, ChronoDuration::milliseconds(10)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(store.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_consume_pending_once() {
        let store = store();
        let record = PendingRegistration::new("+15551234567", "a2V5", 123456, ChronoDuration::hours(1));
        store.put_pending(record.clone()).await.unwrap();

        assert!(store.consume_pending(&record).await.unwrap());
        assert!(!store.consume_pending(&record).await.unwrap());
        assert!(store.get_pending("+15551234567").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_consume_pending_rejects_superseded_record() {
        let store = store();
        let stale = PendingRegistration::new("+15551234567", "a2V5", 111111, ChronoDuration::hours(1));
        let fresh = PendingRegistration::new("+15551234567", "a2V5", 222222, ChronoDuration::hours(1));

        store.put_pending(stale.clone()).await.unwrap();
        store.put_pending(fresh.clone()).await.unwrap();

        assert!(!store.consume_pending(&stale).await.unwrap());
        assert_eq!(store.get_pending("+15551234567").await.unwrap(), Some(fresh));
    }

    #[tokio::test]
    async fn test_delete_pending() {
        let store = store();
        store
            .put_pending(PendingRegistration::new("+15551234567", "a2V5", 123456, ChronoDuration::hours(1)))
            .await
            .unwrap();

        assert!(store.delete_pending("+15551234567").await.unwrap());
        assert!(!store.delete_pending("+15551234567").await.unwrap());
    }

    #[tokio::test]
    async fn test_identity_overwrite() {
        let store = store();
        store.put_identity(identity("+15551234567", "first")).await.unwrap();
        store.put_identity(identity("+15551234567", "second")).await.unwrap();

        let fetched = store.get_identity("+15551234567").await.unwrap().unwrap();
        assert_eq!(fetched.identity_key, "second");
        assert_eq!(fetched.one_time_keys, vec!["otk1", "otk2"]);
        assert_eq!(store.identity_count().await, 1);
    }

    #[tokio::test]
    async fn test_health_check() {
        assert!(store().health_check().await);
    }
}
