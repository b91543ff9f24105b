//! Pack index (v1) reading, writing, and lookup.
//!
//! Index v2 (the `\377tOc` signature, CRC32 table, 64-bit offset table) is
//! not supported; this crate only ever produces and reads v1 indexes.
//!
//! Format:
//!
//! ```text
//! Fanout:  256 × 4-byte big-endian cumulative counts (no header bytes)
//! Records: N × (4-byte big-endian offset, 20-byte checksum), sorted by
//!          checksum
//! Trailer: 20-byte pack checksum | 20-byte index checksum
//! ```
//!
//! Unlike v2, offset and checksum are interleaved per record rather than
//! stored as separate parallel arrays — there is no 64-bit offset table,
//! since this implementation does not support packs requiring one.
//!
//! Lookups are answered with bounded random access: the fan-out table is
//! cached in memory at open time (a fixed 1024 bytes, not proportional to
//! pack size), and a single `read_at` pulls the candidate record window for
//! a binary search. No full-file mmap or read is ever required to serve a
//! lookup.

use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::FileExt;

use git_hash::{fanout::FanoutTable, hasher::Hasher, ObjectId, OID_LEN};

use crate::{PackError, IDX_V1_FANOUT_SIZE, IDX_V1_RECORD_SIZE};

/// A single (checksum, pack offset) record as stored in a v1 index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    pub oid: ObjectId,
    pub offset: u64,
}

/// Pack index (v1) providing OID → offset mapping via bounded random access.
pub struct PackIndex {
    file: File,
    fanout: FanoutTable,
    num_objects: u32,
    idx_path: PathBuf,
}

impl PackIndex {
    /// Open a pack index file, reading only its fixed-size fan-out table.
    pub fn open(idx_path: impl AsRef<Path>) -> Result<Self, PackError> {
        let idx_path = idx_path.as_ref().to_path_buf();
        let file = std::fs::File::open(&idx_path)?;
        let file_len = file.metadata()?.len();

        let min_size = (IDX_V1_FANOUT_SIZE + 2 * OID_LEN) as u64;
        if file_len < min_size {
            return Err(PackError::InvalidIndex("file too small".into()));
        }

        let mut fanout_buf = [0u8; IDX_V1_FANOUT_SIZE];
        read_at(&file, 0, &mut fanout_buf)?;
        let fanout = FanoutTable::from_bytes(&fanout_buf)
            .map_err(|e| PackError::InvalidIndex(format!("bad fanout table: {e}")))?;
        let num_objects = fanout.total();

        let expected_size = IDX_V1_FANOUT_SIZE as u64
            + num_objects as u64 * IDX_V1_RECORD_SIZE as u64
            + 2 * OID_LEN as u64;
        if file_len != expected_size {
            return Err(PackError::InvalidIndex(format!(
                "index file size {file_len} does not match expected size {expected_size} for {num_objects} objects"
            )));
        }

        Ok(Self {
            file,
            fanout,
            num_objects,
            idx_path,
        })
    }

    /// Look up an OID, returning its offset in the pack file.
    ///
    /// Performs a single bounded read: the fan-out table is already cached
    /// in memory, so only the candidate record window is fetched from disk.
    pub fn lookup(&self, oid: &ObjectId) -> Option<u64> {
        let range = self.fanout.range(oid.first_byte());
        if range.is_empty() {
            return None;
        }
        let window = self.read_record_window(range.clone()).ok()?;
        let target = oid.as_bytes();

        let mut low = 0usize;
        let mut high = range.len();
        while low < high {
            let mid = low + (high - low) / 2;
            let rec = &window[mid * IDX_V1_RECORD_SIZE..(mid + 1) * IDX_V1_RECORD_SIZE];
            let rec_oid = &rec[4..4 + OID_LEN];
            match rec_oid.cmp(target.as_slice()) {
                std::cmp::Ordering::Less => low = mid + 1,
                std::cmp::Ordering::Greater => high = mid,
                std::cmp::Ordering::Equal => {
                    return Some(u32::from_be_bytes([rec[0], rec[1], rec[2], rec[3]]) as u64);
                }
            }
        }
        None
    }

    /// Look up all OIDs sharing a given prefix, returned as records.
    ///
    /// Used for abbreviated-OID disambiguation; reads the whole fan-out
    /// bucket for the prefix's first byte rather than a single record.
    pub fn lookup_prefix(&self, prefix: &[u8]) -> Vec<IndexRecord> {
        if prefix.is_empty() {
            return Vec::new();
        }
        let range = self.fanout.range(prefix[0]);
        if range.is_empty() {
            return Vec::new();
        }
        let window = match self.read_record_window(range) {
            Ok(w) => w,
            Err(_) => return Vec::new(),
        };

        let mut results = Vec::new();
        for rec in window.chunks_exact(IDX_V1_RECORD_SIZE) {
            let oid_bytes = &rec[4..4 + OID_LEN];
            if oid_bytes.len() >= prefix.len() && &oid_bytes[..prefix.len()] == prefix {
                if let Ok(oid) = ObjectId::from_bytes(oid_bytes) {
                    let offset = u32::from_be_bytes([rec[0], rec[1], rec[2], rec[3]]) as u64;
                    results.push(IndexRecord { oid, offset });
                }
            }
        }
        results
    }

    /// Total number of objects in this index.
    pub fn num_objects(&self) -> u32 {
        self.num_objects
    }

    /// Path to the .idx file.
    pub fn path(&self) -> &Path {
        &self.idx_path
    }

    /// Pack checksum stored in the index trailer.
    pub fn pack_checksum(&self) -> Result<ObjectId, PackError> {
        let mut buf = [0u8; OID_LEN];
        read_at(&self.file, self.trailer_offset(), &mut buf)?;
        Ok(ObjectId::from_bytes(&buf)?)
    }

    /// Index checksum: the trailing hash of the index file's own contents.
    pub fn index_checksum(&self) -> Result<ObjectId, PackError> {
        let mut buf = [0u8; OID_LEN];
        read_at(&self.file, self.trailer_offset() + OID_LEN as u64, &mut buf)?;
        Ok(ObjectId::from_bytes(&buf)?)
    }

    /// Iterate over all (OID, offset) records in sorted order.
    ///
    /// Unlike `lookup`, this reads the entire record table sequentially;
    /// intended for full enumeration, not per-query lookup.
    pub fn iter(&self) -> Result<Vec<IndexRecord>, PackError> {
        let n = self.num_objects as usize;
        let mut buf = vec![0u8; n * IDX_V1_RECORD_SIZE];
        if n > 0 {
            read_at(&self.file, IDX_V1_FANOUT_SIZE as u64, &mut buf)?;
        }
        Ok(buf
            .chunks_exact(IDX_V1_RECORD_SIZE)
            .map(|rec| {
                let offset = u32::from_be_bytes([rec[0], rec[1], rec[2], rec[3]]) as u64;
                let oid = ObjectId::from_bytes(&rec[4..4 + OID_LEN]).expect("record-sized slice");
                IndexRecord { oid, offset }
            })
            .collect())
    }

    fn trailer_offset(&self) -> u64 {
        IDX_V1_FANOUT_SIZE as u64 + self.num_objects as u64 * IDX_V1_RECORD_SIZE as u64
    }

    fn read_record_window(&self, range: std::ops::Range<usize>) -> Result<Vec<u8>, PackError> {
        let start = IDX_V1_FANOUT_SIZE as u64 + range.start as u64 * IDX_V1_RECORD_SIZE as u64;
        let mut buf = vec![0u8; range.len() * IDX_V1_RECORD_SIZE];
        read_at(&self.file, start, &mut buf)?;
        Ok(buf)
    }
}

/// Builds and writes a v1 pack index file from a pack's scanned entries.
pub struct PackIndexWriter;

impl PackIndexWriter {
    /// Serialize `entries` (need not be pre-sorted) into v1 index bytes.
    pub fn build(entries: &[(ObjectId, u64)], pack_checksum: ObjectId) -> Vec<u8> {
        let mut sorted: Vec<(ObjectId, u64)> = entries.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        let oids: Vec<ObjectId> = sorted.iter().map(|(oid, _)| *oid).collect();
        let fanout = FanoutTable::build(&oids);

        let mut buf = Vec::with_capacity(
            IDX_V1_FANOUT_SIZE + sorted.len() * IDX_V1_RECORD_SIZE + 2 * OID_LEN,
        );
        buf.extend_from_slice(&fanout.to_bytes());
        for (oid, offset) in &sorted {
            buf.extend_from_slice(&(*offset as u32).to_be_bytes());
            buf.extend_from_slice(oid.as_bytes());
        }
        buf.extend_from_slice(pack_checksum.as_bytes());

        let mut hasher = Hasher::new();
        hasher.update(&buf);
        let idx_checksum = hasher.finalize();
        buf.extend_from_slice(idx_checksum.as_bytes());

        buf
    }

    /// Build and atomically write the index to `idx_path`.
    pub fn write_to_path(
        idx_path: impl AsRef<Path>,
        entries: &[(ObjectId, u64)],
        pack_checksum: ObjectId,
    ) -> Result<(), PackError> {
        let idx_path = idx_path.as_ref();
        let data = Self::build(entries, pack_checksum);
        let tmp_path = idx_path.with_extension("idx.tmp");
        {
            let mut f = File::create(&tmp_path)?;
            f.write_all(&data)?;
            f.sync_all()?;
        }
        std::fs::rename(&tmp_path, idx_path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn read_at(file: &File, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
    file.read_exact_at(buf, offset)
}

#[cfg(not(unix))]
fn read_at(file: &File, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
    use std::io::{Read, Seek, SeekFrom};
    let mut file = file.try_clone()?;
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(buf)
}
