//! Encrypted file-backed storage.
//!
//! Each region lives in its own file `<data_dir>/<region>.enc` with the layout
//! `[12 bytes nonce][AES-256-GCM ciphertext with auth tag]`. The whole region
//! is rewritten on every mutation, atomically via temp file + rename, while
//! the region's write lock is held.

use crate::error::StoreError;
use crate::store::RegistrationStore;
use crate::types::{PendingRegistration, StoreConfig, VerifiedIdentity};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use async_trait::async_trait;
use chrono::Utc;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Nonce size for AES-GCM (96 bits = 12 bytes).
const NONCE_SIZE: usize = 12;

/// One encrypted region file.
struct RegionFile {
    path: PathBuf,
    key: [u8; 32],
}

impl RegionFile {
    fn new(data_dir: &Path, region: &str, secret: &SecretString) -> Self {
        Self {
            path: data_dir.join(format!("{}.enc", region)),
            key: derive_key(secret, region),
        }
    }

    /// Load and decrypt the region. A missing file is an empty region.
    async fn load<T: DeserializeOwned + Default>(&self) -> Result<T, StoreError> {
        if !self.path.exists() {
            info!("Region file not found at {:?}, starting empty", self.path);
            return Ok(T::default());
        }

        let data = fs::read(&self.path).await?;
        if data.len() < NONCE_SIZE {
            return Err(StoreError::Encryption(format!(
                "Region file {:?} is truncated",
                self.path
            )));
        }

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let nonce = Nonce::from_slice(&data[..NONCE_SIZE]);
        let plaintext = cipher.decrypt(nonce, &data[NONCE_SIZE..]).map_err(|_| {
            StoreError::Encryption(format!(
                "Failed to decrypt {:?}. The encryption secret may have changed.",
                self.path
            ))
        })?;

        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// Encrypt and atomically replace the region file.
    async fn save<T: Serialize>(&self, region: &T) -> Result<(), StoreError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let plaintext = serde_json::to_vec(region)?;
        let ciphertext = cipher.encrypt(nonce, plaintext.as_ref())?;

        let mut data = nonce_bytes.to_vec();
        data.extend(ciphertext);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, &data).await?;
        fs::rename(&temp_path, &self.path).await?;

        debug!("Saved region ({} bytes) to {:?}", data.len(), self.path);
        Ok(())
    }
}

/// Derive a region key: SHA256(secret || region).
fn derive_key(secret: &SecretString, region: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(secret.expose_secret().as_bytes());
    hasher.update(region.as_bytes());
    hasher.finalize().into()
}

/// Registration store persisted to encrypted files.
///
/// Suitable for a single process; the files are not shared safely between
/// several writers.
pub struct EncryptedFileStore {
    pending: RwLock<HashMap<String, PendingRegistration>>,
    identities: RwLock<HashMap<String, VerifiedIdentity>>,
    pending_file: RegionFile,
    identity_file: RegionFile,
}

impl EncryptedFileStore {
    /// Open (or create) the region files under `data_dir`.
    pub async fn open(
        data_dir: impl AsRef<Path>,
        config: StoreConfig,
        secret: SecretString,
    ) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref();
        let pending_file = RegionFile::new(data_dir, &config.pending_region, &secret);
        let identity_file = RegionFile::new(data_dir, &config.identity_region, &secret);

        let mut pending: HashMap<String, PendingRegistration> = pending_file.load().await?;
        let identities: HashMap<String, VerifiedIdentity> = identity_file.load().await?;

        let now = Utc::now();
        let before = pending.len();
        pending.retain(|_, record| !record.is_expired_at(now));
        if pending.len() < before {
            debug!("Dropped {} expired pending registrations on load", before - pending.len());
        }

        info!(
            pending_region = %config.pending_region,
            identity_region = %config.identity_region,
            locality = ?config.locality,
            "Opened encrypted registration store with {} pending and {} verified records",
            pending.len(),
            identities.len()
        );

        Ok(Self {
            pending: RwLock::new(pending),
            identities: RwLock::new(identities),
            pending_file,
            identity_file,
        })
    }
}

#[async_trait]
impl RegistrationStore for EncryptedFileStore {
    #[instrument(skip(self))]
    async fn get_pending(&self, phone: &str) -> Result<Option<PendingRegistration>, StoreError> {
        let pending = self.pending.read().await;
        Ok(pending.get(phone).filter(|r| !r.is_expired()).cloned())
    }

    #[instrument(skip(self, record), fields(phone = %record.phone))]
    async fn put_pending(&self, record: PendingRegistration) -> Result<(), StoreError> {
        let mut pending = self.pending.write().await;
        let now = Utc::now();
        let mut next: HashMap<_, _> = pending
            .iter()
            .filter(|(_, r)| !r.is_expired_at(now))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        next.insert(record.phone.clone(), record);

        self.pending_file.save(&next).await?;
        *pending = next;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_pending(&self, phone: &str) -> Result<bool, StoreError> {
        let mut pending = self.pending.write().await;
        if !pending.contains_key(phone) {
            return Ok(false);
        }

        let mut next = pending.clone();
        next.remove(phone);
        self.pending_file.save(&next).await?;
        *pending = next;
        Ok(true)
    }

    #[instrument(skip(self, expected), fields(phone = %expected.phone))]
    async fn consume_pending(&self, expected: &PendingRegistration) -> Result<bool, StoreError> {
        let mut pending = self.pending.write().await;
        match pending.get(&expected.phone) {
            Some(current) if current == expected && !current.is_expired() => {}
            _ => return Ok(false),
        }

        let mut next = pending.clone();
        next.remove(&expected.phone);
        self.pending_file.save(&next).await?;
        *pending = next;
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn get_identity(&self, phone: &str) -> Result<Option<VerifiedIdentity>, StoreError> {
        let identities = self.identities.read().await;
        Ok(identities.get(phone).cloned())
    }

    #[instrument(skip(self, record), fields(phone = %record.phone))]
    async fn put_identity(&self, record: VerifiedIdentity) -> Result<(), StoreError> {
        let mut identities = self.identities.write().await;
        let mut next = identities.clone();
        next.insert(record.phone.clone(), record);

        self.identity_file.save(&next).await?;
        *identities = next;
        Ok(())
    }

    async fn health_check(&self) -> bool {
        match self.pending_file.path.parent() {
            Some(dir) => fs::metadata(dir).await.map(|m| m.is_dir()).unwrap_or_else(|e| {
                warn!("Store data directory unavailable: {}", e);
                false
            }),
            None => true,
        }
    }
}
