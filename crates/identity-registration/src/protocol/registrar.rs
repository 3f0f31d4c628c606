//! Two-phase enrollment: issue a code for a claimed identity key, then bind
//! the key bundle once the code and a proof of possession check out.

use super::code::{code_matches, generate_code};
use super::keys::{
    decode_identity_key, decode_signature, decode_signed_pre_key, fingerprint,
    verify_pre_key_signature,
};
use super::phone::normalize_phone_number;
use crate::error::{FinalizationError, InitiationError};
use chrono::{Duration, Utc};
use registration_store::{PendingRegistration, RegistrationStore, VerifiedIdentity};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Protocol parameters.
#[derive(Debug, Clone)]
pub struct RegistrationSettings {
    /// How long an issued code stays redeemable
    pub pending_ttl: Duration,
    /// Upper bound on one-time keys accepted per finalization
    pub max_one_time_keys: usize,
}

impl Default for RegistrationSettings {
    fn default() -> Self {
        Self {
            pending_ttl: Duration::hours(1),
            max_one_time_keys: 100,
        }
    }
}

/// Phase 2 input, with key material still in its wire encoding.
#[derive(Debug, Clone)]
pub struct FinalizeRegistration {
    pub phone: String,
    pub code: String,
    pub signed_pre_key: String,
    pub signature: String,
    pub one_time_keys: Vec<String>,
}

/// Runs both protocol phases against an injected store.
#[derive(Clone)]
pub struct Registrar {
    store: Arc<dyn RegistrationStore>,
    settings: RegistrationSettings,
}

impl Registrar {
    pub fn new(store: Arc<dyn RegistrationStore>, settings: RegistrationSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &RegistrationSettings {
        &self.settings
    }

    /// Whether the backing store can serve requests.
    pub async fn store_healthy(&self) -> bool {
        self.store.health_check().await
    }

    /// Whether `phone` (already normalized) has a live pending registration.
    pub async fn has_pending(&self, phone: &str) -> Result<bool, FinalizationError> {
        self.store
            .get_pending(phone)
            .await
            .map(|pending| pending.is_some())
            .map_err(FinalizationError::StoreRead)
    }

    /// Phase 1: issue a one-time code for `phone` and remember the claimed
    /// identity key until the code expires.
    ///
    /// Any earlier pending registration for the same phone is replaced.
    #[instrument(skip_all)]
    pub async fn initiate(&self, phone: &str, identity_key: &str) -> Result<(), InitiationError> {
        let phone = normalize_phone_number(phone).map_err(InitiationError::MalformedInput)?;
        let key = decode_identity_key(identity_key).map_err(InitiationError::MalformedInput)?;

        let record = PendingRegistration::new(
            phone.clone(),
            identity_key,
            generate_code(),
            self.settings.pending_ttl,
        );
        let expires_at = record.expires_at;

        self.store.put_pending(record).await.map_err(|e| {
            warn!(phone = %phone, "Failed to write pending registration: {}", e);
            InitiationError::StoreWrite(e)
        })?;

        info!(
            phone = %phone,
            identity_key = %fingerprint(key.as_bytes()),
            %expires_at,
            "Registration initiated, awaiting one-time code"
        );
        Ok(())
    }

    /// Phase 2: redeem the one-time code and commit the verified identity.
    ///
    /// The pending record is consumed by the first attempt that reaches the
    /// code check, whatever its outcome, so a code is never redeemable twice.
    #[instrument(skip_all)]
    pub async fn finalize(&self, request: FinalizeRegistration) -> Result<(), FinalizationError> {
        let phone =
            normalize_phone_number(&request.phone).map_err(FinalizationError::MalformedInput)?;
        let signed_pre_key = decode_signed_pre_key(&request.signed_pre_key)
            .map_err(FinalizationError::MalformedInput)?;
        let signature =
            decode_signature(&request.signature).map_err(FinalizationError::MalformedInput)?;
        self.check_one_time_keys(&request.one_time_keys)?;

        let pending = self
            .store
            .get_pending(&phone)
            .await
            .map_err(FinalizationError::StoreRead)?
            .ok_or_else(|| {
                debug!(phone = %phone, "No live pending registration");
                FinalizationError::NotFound
            })?;

        if !code_matches(&request.code, pending.code) {
            self.store
                .consume_pending(&pending)
                .await
                .map_err(FinalizationError::StoreWrite)?;
            warn!(phone = %phone, "One-time code mismatch, pending registration discarded");
            return Err(FinalizationError::CodeMismatch);
        }

        // The key was validated at initiation; a record that no longer decodes
        // cannot prove possession either.
        let proven = decode_identity_key(&pending.identity_key)
            .ok()
            .map(|key| verify_pre_key_signature(&key, &signed_pre_key, &signature).is_ok())
            .unwrap_or(false);

        if !self
            .store
            .consume_pending(&pending)
            .await
            .map_err(FinalizationError::StoreWrite)?
        {
            debug!(phone = %phone, "Pending registration consumed by a concurrent attempt");
            return Err(FinalizationError::NotFound);
        }

        if !proven {
            warn!(phone = %phone, "Signed prekey signature rejected");
            return Err(FinalizationError::InvalidSignature);
        }

        let identity = VerifiedIdentity {
            phone: phone.clone(),
            identity_key: pending.identity_key,
            signed_pre_key: request.signed_pre_key,
            signature: request.signature,
            one_time_keys: request.one_time_keys,
            created_at: Utc::now(),
        };
        let one_time_key_count = identity.one_time_keys.len();

        self.store.put_identity(identity).await.map_err(|e| {
            warn!(phone = %phone, "Failed to write verified identity: {}", e);
            FinalizationError::StoreWrite(e)
        })?;

        info!(
            phone = %phone,
            one_time_keys = one_time_key_count,
            "Identity verified and stored"
        );
        Ok(())
    }

    fn check_one_time_keys(&self, keys: &[String]) -> Result<(), FinalizationError> {
        if keys.len() > self.settings.max_one_time_keys {
            return Err(FinalizationError::MalformedInput(format!(
                "at most {} oneTimeKeys accepted, got {}",
                self.settings.max_one_time_keys,
                keys.len()
            )));
        }

        if let Some(index) = keys.iter().position(|k| k.is_empty()) {
            return Err(FinalizationError::MalformedInput(format!(
                "oneTimeKeys[{}] is empty",
                index
            )));
        }

        Ok(())
    }
}
