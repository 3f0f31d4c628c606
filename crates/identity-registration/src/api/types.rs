//! API request and response types.

use crate::protocol::FinalizeRegistration;
use serde::{Deserialize, Serialize};

/// Phase 1 request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    pub phone: String,

    /// Claimed identity public key, standard base64
    pub identity_key: String,
}

/// Phase 2 request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub phone: String,
    pub code: String,
    pub signed_pre_key: String,
    pub signature: String,
    pub one_time_keys: Vec<String>,
}

impl From<FinalizeRequest> for FinalizeRegistration {
    fn from(request: FinalizeRequest) -> Self {
        Self {
            phone: request.phone,
            code: request.code,
            signed_pre_key: request.signed_pre_key,
            signature: request.signature,
            one_time_keys: request.one_time_keys,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub store_healthy: bool,
}
