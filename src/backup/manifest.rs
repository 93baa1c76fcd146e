//! Backup manifest schema.
//!
//! The manifest is the special first frame inside the decrypted archive.
//! It lists the archive's shape and integrity digest so a backup can be
//! verified without extracting a single data file, and carries a
//! secondary copy of the key-derivation envelope so the file remains
//! self-describing.

use serde::{Deserialize, Serialize};

use crate::config::MANIFEST_VERSION;
use crate::error::{Result, VaultError};

/// JSON manifest embedded as the first archive frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupManifest {
    /// Manifest schema version, `"1.0"`.
    pub version: String,

    /// RFC 3339 creation timestamp.
    #[serde(rename = "creationDate")]
    pub creation_date: String,

    /// Number of data entries in the archive.
    #[serde(rename = "fileCount")]
    pub file_count: u32,

    /// Sum of the entries' plaintext sizes in bytes.
    #[serde(rename = "totalSize")]
    pub total_size: u64,

    /// Hex SHA-256 over the canonical ordering of the entries' digests.
    #[serde(rename = "vaultChecksum")]
    pub vault_checksum: String,

    /// Hex copy of the KDF salt from the file header.
    #[serde(rename = "kdfSalt")]
    pub kdf_salt: String,

    /// Hex copy of the serialized KDF parameters from the file header.
    #[serde(rename = "kdfParams")]
    pub kdf_params: String,
}

impl BackupManifest {
    /// Serializes to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Malformed`] if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| VaultError::malformed(format!("manifest: {e}")))
    }

    /// Parses JSON bytes and checks the schema version.
    ///
    /// A version mismatch is a hard failure; there is no silent upgrade.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Malformed`] on invalid JSON or an
    /// unsupported version.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let manifest: Self = serde_json::from_slice(bytes)
            .map_err(|e| VaultError::malformed(format!("manifest: {e}")))?;

        if manifest.version != MANIFEST_VERSION {
            return Err(VaultError::malformed(format!(
                "unsupported manifest version {:?} (expected {MANIFEST_VERSION:?})",
                manifest.version
            )));
        }

        Ok(manifest)
    }
}
