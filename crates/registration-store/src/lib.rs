//! Storage regions for phone-bound identity enrollment.
//!
//! Two key-value regions keyed by phone number:
//! - pending registrations, short-lived and expiring by value
//! - verified identities, durable
//!
//! Handlers depend only on the [`RegistrationStore`] capability; backends are
//! chosen once per process.

mod error;
mod file;
mod memory;
mod store;
mod types;

pub use error::StoreError;
pub use file::EncryptedFileStore;
pub use memory::MemoryStore;
pub use store::RegistrationStore;
pub use types::*;
