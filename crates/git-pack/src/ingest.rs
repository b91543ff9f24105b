//! Pack Stream Ingestor.
//!
//! Consumes a smart-HTTP `git-upload-pack` response body: a leading pkt-line
//! (`NAK\n` in the cases this client drives) followed by the raw pack
//! bytes. Validates the header, streams the body to a temp file bounded by
//! a configurable size limit, verifies the trailing SHA-1 against the
//! streamed content, and renames the file into place as `pack-<hex>.pack`.
//!
//! State model: `ReadHeader → ReadEntries(remaining) → ReadTrailer →
//! Verified`, with no back-edges — any failure is terminal and the partial
//! temp file is discarded rather than left behind.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use git_hash::{hasher::Hasher, ObjectId, OID_LEN};
use tempfile::NamedTempFile;

use crate::{is_supported_pack_version, PackError, DEFAULT_PACK_SIZE_LIMIT, PACK_HEADER_SIZE, PACK_SIGNATURE};

/// Tunable limits for the ingestor.
#[derive(Debug, Clone, Copy)]
pub struct IngestConfig {
    /// Maximum number of pack bytes (after the leading pkt-line) accepted
    /// before the stream is rejected with `ReadLimitExceeded`.
    pub size_limit: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            size_limit: DEFAULT_PACK_SIZE_LIMIT,
        }
    }
}

/// Result of a successful ingestion.
pub struct IngestedPack {
    /// Final path of the pack file, named `pack-<hex>.pack`.
    pub pack_path: PathBuf,
    /// SHA-1 checksum over the pack's header and entries (the trailer value).
    pub checksum: ObjectId,
    /// Object count declared in the pack header.
    pub num_objects: u32,
}

/// Read the smart-HTTP response body from `reader`, discard its leading
/// pkt-line, and stream the pack into `dest_dir`.
///
/// `dest_dir` must already exist; the pack is written there as
/// `pack-<hex>.pack` once fully verified.
pub fn ingest_pack_stream<R: Read>(
    mut reader: R,
    dest_dir: &Path,
    config: &IngestConfig,
) -> Result<IngestedPack, PackError> {
    discard_leading_pktline(&mut reader)?;

    let mut tmp = NamedTempFile::new_in(dest_dir)?;
    let mut hasher = Hasher::new();
    let mut total_read: u64 = 0;

    let mut header = [0u8; PACK_HEADER_SIZE];
    read_counted(&mut reader, &mut header, &mut total_read, config.size_limit)?;

    if &header[0..4] != PACK_SIGNATURE {
        return Err(PackError::InvalidHeader("bad PACK signature".into()));
    }
    let version = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    if !is_supported_pack_version(version) {
        return Err(PackError::UnsupportedVersion(version));
    }
    let num_objects = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);

    hasher.update(&header);
    tmp.write_all(&header)?;

    // Stream the remainder, holding back the last OID_LEN bytes as the
    // candidate trailer until we see EOF (we don't know the stream length
    // up front).
    let mut pending: Vec<u8> = Vec::with_capacity(OID_LEN * 2);
    let mut chunk = [0u8; 64 * 1024];
    loop {
        let n = read_some(&mut reader, &mut chunk, &mut total_read, config.size_limit)?;
        if n == 0 {
            break;
        }
        pending.extend_from_slice(&chunk[..n]);
        if pending.len() > OID_LEN {
            let commit_len = pending.len() - OID_LEN;
            let commit: Vec<u8> = pending.drain(..commit_len).collect();
            hasher.update(&commit);
            tmp.write_all(&commit)?;
        }
    }

    if pending.len() != OID_LEN {
        return Err(PackError::InvalidHeader(
            "pack stream truncated before trailing checksum".into(),
        ));
    }

    let expected = ObjectId::from_bytes(&pending)?;
    let actual = hasher.finalize();
    if actual != expected {
        return Err(PackError::ChecksumMismatch { expected, actual });
    }

    tmp.as_file().sync_all()?;

    let pack_path = dest_dir.join(format!("pack-{}.pack", actual.to_hex()));
    tmp.persist(&pack_path)
        .map_err(|e| PackError::Io(e.error))?;

    Ok(IngestedPack {
        pack_path,
        checksum: actual,
        num_objects,
    })
}

/// Read and discard a single leading pkt-line (e.g. `NAK\n`).
///
/// A flush-pkt (`0000`) is treated as an empty line and simply consumed.
fn discard_leading_pktline<R: Read>(reader: &mut R) -> Result<(), PackError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len_str = std::str::from_utf8(&len_buf)
        .map_err(|_| PackError::InvalidHeader("invalid pkt-line length prefix".into()))?;
    let len = u32::from_str_radix(len_str, 16)
        .map_err(|_| PackError::InvalidHeader("invalid pkt-line length prefix".into()))?;
    if len == 0 {
        return Ok(());
    }
    if len < 4 {
        return Err(PackError::InvalidHeader("pkt-line shorter than its own prefix".into()));
    }
    let mut body = vec![0u8; (len - 4) as usize];
    reader.read_exact(&mut body)?;
    Ok(())
}

fn read_counted<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    total_read: &mut u64,
    limit: u64,
) -> Result<(), PackError> {
    check_limit(*total_read + buf.len() as u64, limit)?;
    reader.read_exact(buf)?;
    *total_read += buf.len() as u64;
    Ok(())
}

fn read_some<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    total_read: &mut u64,
    limit: u64,
) -> Result<usize, PackError> {
    let n = reader.read(buf)?;
    *total_read += n as u64;
    check_limit(*total_read, limit)?;
    Ok(n)
}

fn check_limit(candidate_total: u64, limit: u64) -> Result<(), PackError> {
    if candidate_total > limit {
        Err(PackError::ReadLimitExceeded { limit })
    } else {
        Ok(())
    }
}
