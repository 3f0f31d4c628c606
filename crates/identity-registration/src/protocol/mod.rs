//! Enrollment protocol.

mod code;
mod keys;
mod phone;
mod registrar;

pub use code::{code_matches, generate_code, CODE_MAX, CODE_MIN};
pub use keys::{
    decode_identity_key, decode_signature, decode_signed_pre_key, fingerprint,
    verify_pre_key_signature,
};
pub use phone::normalize_phone_number;
pub use registrar::{FinalizeRegistration, RegistrationSettings, Registrar};
