//! Storage capability shared by the registration handlers.

use crate::error::StoreError;
use crate::types::{PendingRegistration, VerifiedIdentity};
use async_trait::async_trait;

/// Access to the pending-registration and verified-identity regions.
///
/// Implementations must give read-your-writes consistency per key and must
/// never return a pending record whose expiry has passed, even if the record
/// is still physically present.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Fetch the live pending record for `phone`.
    async fn get_pending(&self, phone: &str) -> Result<Option<PendingRegistration>, StoreError>;

    /// Write a pending record, replacing any previous one for the same phone.
    async fn put_pending(&self, record: PendingRegistration) -> Result<(), StoreError>;

    /// Remove the pending record for `phone`. Returns whether one was removed.
    async fn delete_pending(&self, phone: &str) -> Result<bool, StoreError>;

    /// Remove the pending record only if the stored record still equals
    /// `expected` and has not expired.
    ///
    /// This is the commit point of a finalization: of several concurrent
    /// callers holding the same record, exactly one sees `true`.
    async fn consume_pending(&self, expected: &PendingRegistration) -> Result<bool, StoreError>;

    /// Fetch the verified identity for `phone`.
    async fn get_identity(&self, phone: &str) -> Result<Option<VerifiedIdentity>, StoreError>;

    /// Write a verified identity, replacing any previous one for the same phone.
    async fn put_identity(&self, record: VerifiedIdentity) -> Result<(), StoreError>;

    /// Whether the backend is able to serve requests.
    async fn health_check(&self) -> bool {
        true
    }
}
