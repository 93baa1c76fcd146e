//! Memory-hard password-based key derivation.
//!
//! Argon2id is the primary algorithm; PBKDF2-HMAC-SHA512 is the fallback
//! for environments without it. The password is consumed through a
//! reference to its zeroizable buffer and is never copied into an
//! allocation that outlives the call. The derived key comes back in a
//! self-zeroizing buffer owned by the caller.

use argon2::Algorithm::Argon2id;
use argon2::Version::V0x13;
use argon2::{Argon2, Params};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha512;
use zeroize::Zeroizing;

mod bench;
mod params;

pub use bench::{BenchOptions, bench, bench_with};
pub use params::{KdfAlgorithm, KdfParams};

use crate::codec::random_bytes;
use crate::config::{KDF_OUT_LEN, SALT_LEN};
use crate::error::{Result, VaultError};
use crate::secret::Password;

/// A derived key in a buffer that zeroizes itself on drop.
pub type DerivedKey = Zeroizing<[u8; KDF_OUT_LEN]>;

/// Generates a fresh random salt for a wrap or verifier.
///
/// # Errors
///
/// Returns an error if the random source fails.
pub fn generate_salt() -> Result<[u8; SALT_LEN]> {
    random_bytes()
}

/// Derives a fixed-length key from password material.
///
/// Deterministic for identical `(password, salt, params)`; distinct salts
/// produce independent keys.
///
/// # Errors
///
/// [`VaultError::KdfParamsInvalid`] if the parameters or salt length fall
/// outside the documented ranges; [`VaultError::KdfUnavailable`] if the
/// selected algorithm cannot run in this environment.
pub fn derive(password: &Password, salt: &[u8], params: &KdfParams) -> Result<DerivedKey> {
    params.validate()?;

    if salt.len() != usize::from(params.salt_len) {
        return Err(VaultError::KdfParamsInvalid(format!(
            "salt length {} does not match record ({})",
            salt.len(),
            params.salt_len
        )));
    }

    let mut key = Zeroizing::new([0u8; KDF_OUT_LEN]);

    match params.algorithm {
        KdfAlgorithm::Argon2id => {
            let argon_params =
                Params::new(params.mem_kib, params.passes, params.parallelism, Some(KDF_OUT_LEN))
                    .map_err(|e| VaultError::KdfParamsInvalid(e.to_string()))?;
            let argon2 = Argon2::new(Argon2id, V0x13, argon_params);

            argon2
                .hash_password_into(password.expose(), salt, &mut key[..])
                .map_err(|e| {
                    tracing::warn!(error = %e, "argon2id derivation unavailable");
                    VaultError::KdfUnavailable
                })?;
        }
        KdfAlgorithm::Pbkdf2HmacSha512 => {
            pbkdf2_hmac::<Sha512>(password.expose(), salt, params.pbkdf2_iters, &mut key[..]);
        }
    }

    Ok(key)
}
