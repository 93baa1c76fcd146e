//! Compressed entry-stream archive.
//!
//! The plaintext of a backup file is a single zlib (DEFLATE) stream of
//! length-prefixed frames. The first frame is the JSON manifest; each
//! following frame is one data entry:
//!
//! ```text
//! manifest-len(4, big-endian) ‖ manifest-json
//! name-len(2) ‖ name(utf-8) ‖ data-len(8) ‖ data    (repeated)
//! ```
//!
//! The manifest frame can be read without decompressing the rest of the
//! stream, which is what backup verification does.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::config::MAX_ENTRY_NAME;
use crate::error::{Result, VaultError};

/// Upper bound on the manifest frame, in bytes.
const MAX_MANIFEST: usize = 16 * 1024 * 1024;

/// One named data entry of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Relative path with `/` separators.
    pub name: String,

    /// Plaintext file content.
    pub data: Vec<u8>,
}

/// Builds the compressed archive: manifest frame first, then every entry
/// in the order given.
///
/// # Errors
///
/// Returns an error if an entry name is oversized or compression fails.
pub fn build(manifest_json: &[u8], entries: &[ArchiveEntry]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());

    encoder.write_all(&(manifest_json.len() as u32).to_be_bytes())?;
    encoder.write_all(manifest_json)?;

    for entry in entries {
        let name = entry.name.as_bytes();
        if name.is_empty() || name.len() > MAX_ENTRY_NAME {
            return Err(VaultError::malformed(format!(
                "entry name length {} outside 1..={MAX_ENTRY_NAME}",
                name.len()
            )));
        }

        encoder.write_all(&(name.len() as u16).to_be_bytes())?;
        encoder.write_all(name)?;
        encoder.write_all(&(entry.data.len() as u64).to_be_bytes())?;
        encoder.write_all(&entry.data)?;
    }

    Ok(encoder.finish()?)
}

/// Reads only the manifest frame out of a compressed archive.
///
/// Decompresses just enough of the stream to recover the first frame; the
/// data entries behind it stay untouched.
///
/// # Errors
///
/// Returns [`VaultError::Malformed`] if the stream is corrupt or the
/// manifest frame is truncated or oversized.
pub fn read_manifest(archive: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(archive);
    read_manifest_frame(&mut decoder)
}

/// Reads the manifest frame and every data entry.
///
/// # Errors
///
/// Returns [`VaultError::Malformed`] on any framing or decompression
/// defect.
pub fn read_all(archive: &[u8]) -> Result<(Vec<u8>, Vec<ArchiveEntry>)> {
    let mut decoder = ZlibDecoder::new(archive);
    let manifest = read_manifest_frame(&mut decoder)?;

    let mut entries = Vec::new();
    while let Some(name_len) = read_entry_start(&mut decoder)? {
        if name_len == 0 || name_len > MAX_ENTRY_NAME {
            return Err(VaultError::malformed(format!(
                "entry name length {name_len} outside 1..={MAX_ENTRY_NAME}"
            )));
        }

        let mut name_bytes = vec![0u8; name_len];
        read_exact(&mut decoder, &mut name_bytes)?;
        let name = String::from_utf8(name_bytes)
            .map_err(|_| VaultError::malformed("entry name is not utf-8"))?;

        let data_len = read_u64(&mut decoder)?;
        let mut data = Vec::new();
        let copied = decoder
            .by_ref()
            .take(data_len)
            .read_to_end(&mut data)
            .map_err(|e| VaultError::malformed(format!("archive: {e}")))?;
        if copied as u64 != data_len {
            return Err(VaultError::malformed(format!(
                "entry {name:?} truncated: expected {data_len} bytes, got {copied}"
            )));
        }

        entries.push(ArchiveEntry { name, data });
    }

    Ok((manifest, entries))
}

fn read_manifest_frame(reader: &mut impl Read) -> Result<Vec<u8>> {
    let mut len_bytes = [0u8; 4];
    read_exact(reader, &mut len_bytes)?;
    let len = u32::from_be_bytes(len_bytes) as usize;

    if len > MAX_MANIFEST {
        return Err(VaultError::malformed(format!(
            "manifest frame of {len} bytes exceeds {MAX_MANIFEST}"
        )));
    }

    let mut manifest = vec![0u8; len];
    read_exact(reader, &mut manifest)?;
    Ok(manifest)
}

/// Reads the 2-byte name length of the next entry, or `None` at a clean
/// end of stream.
fn read_entry_start(reader: &mut impl Read) -> Result<Option<usize>> {
    let mut bytes = [0u8; 2];
    let first = reader
        .read(&mut bytes[..1])
        .map_err(|e| VaultError::malformed(format!("archive: {e}")))?;
    if first == 0 {
        return Ok(None);
    }

    read_exact(reader, &mut bytes[1..])?;
    Ok(Some(usize::from(u16::from_be_bytes(bytes))))
}

fn read_exact(reader: &mut impl Read, buf: &mut [u8]) -> Result<()> {
    reader
        .read_exact(buf)
        .map_err(|e| VaultError::malformed(format!("archive: {e}")))
}

fn read_u64(reader: &mut impl Read) -> Result<u64> {
    let mut bytes = [0u8; 8];
    read_exact(reader, &mut bytes)?;
    Ok(u64::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entries() -> Vec<ArchiveEntry> {
        vec![
            ArchiveEntry { name: "a.bin".to_owned(), data: vec![0xAB; 1024] },
            ArchiveEntry { name: "nested/b.txt".to_owned(), data: b"payload".to_vec() },
        ]
    }

    #[test]
    fn test_roundtrip() {
        let manifest = br#"{"version":"1.0"}"#;
        let entries = sample_entries();

        let archive = build(manifest, &entries).unwrap();
        let (parsed_manifest, parsed_entries) = read_all(&archive).unwrap();

        assert_eq!(parsed_manifest, manifest);
        assert_eq!(parsed_entries, entries);
    }

    #[test]
    fn test_read_manifest_only() {
        let manifest = br#"{"version":"1.0","fileCount":2}"#;
        let archive = build(manifest, &sample_entries()).unwrap();

        assert_eq!(read_manifest(&archive).unwrap(), manifest);
    }

    #[test]
    fn test_empty_archive() {
        let manifest = br#"{"version":"1.0","fileCount":0}"#;
        let archive = build(manifest, &[]).unwrap();

        let (parsed_manifest, entries) = read_all(&archive).unwrap();
        assert_eq!(parsed_manifest, manifest);
        assert!(entries.is_empty());
    }

    #[test]
    fn test_zero_byte_entry() {
        let entries = vec![ArchiveEntry { name: "empty".to_owned(), data: Vec::new() }];
        let archive = build(b"{}", &entries).unwrap();

        let (_, parsed) = read_all(&archive).unwrap();
        assert_eq!(parsed, entries);
    }

    #[test]
    fn test_compression_shrinks_redundant_data() {
        let entries =
            vec![ArchiveEntry { name: "zeros".to_owned(), data: vec![0u8; 64 * 1024] }];
        let archive = build(b"{}", &entries).unwrap();
        assert!(archive.len() < 8 * 1024);
    }

    #[test]
    fn test_corrupt_stream_is_malformed() {
        let result = read_all(b"this is not a zlib stream");
        assert!(matches!(result, Err(VaultError::Malformed(_))));
    }

    #[test]
    fn test_truncated_entry_is_malformed() {
        let manifest = b"{}";
        let archive = build(manifest, &sample_entries()).unwrap();

        // Rebuild a stream whose last entry promises more data than it has.
        let (parsed_manifest, mut entries) = read_all(&archive).unwrap();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&(parsed_manifest.len() as u32).to_be_bytes()).unwrap();
        encoder.write_all(&parsed_manifest).unwrap();
        let entry = entries.remove(0);
        encoder.write_all(&(entry.name.len() as u16).to_be_bytes()).unwrap();
        encoder.write_all(entry.name.as_bytes()).unwrap();
        encoder.write_all(&(entry.data.len() as u64 + 1).to_be_bytes()).unwrap();
        encoder.write_all(&entry.data).unwrap();
        let truncated = encoder.finish().unwrap();

        assert!(matches!(read_all(&truncated), Err(VaultError::Malformed(_))));
    }

    #[test]
    fn test_oversized_name_rejected_on_build() {
        let entries = vec![ArchiveEntry { name: "x".repeat(MAX_ENTRY_NAME + 1), data: Vec::new() }];
        assert!(matches!(build(b"{}", &entries), Err(VaultError::Malformed(_))));
    }
}
