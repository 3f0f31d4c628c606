//! Identity Registration - binds a phone number to an Ed25519 identity key
//! and its prekey bundle.
//!
//! Enrollment runs in two phases:
//! - initiate: a one-time code is issued for a claimed identity key and kept
//!   in the pending region until it expires
//! - finalize: the code is redeemed together with a signed prekey whose
//!   signature proves possession of the identity key, and the bundle is
//!   committed to the identity region
//!
//! Delivering the code to the phone is left to an external channel.

pub mod api;
pub mod config;
pub mod error;
pub mod protocol;

pub use config::Config;
pub use error::{ApiError, FinalizationError, InitiationError};
pub use protocol::{FinalizeRegistration, RegistrationSettings, Registrar};
