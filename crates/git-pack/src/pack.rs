//! PackFile: reading `.pack` files.
//!
//! A pack file contains a header, a sequence of compressed objects
//! (possibly deltified), and a trailing checksum.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use flate2::bufread::ZlibDecoder;
use git_hash::hasher::Hasher;
use git_hash::{ObjectId, OID_LEN};
use git_object::ObjectType;
use memmap2::Mmap;
use std::io::Read;

use crate::entry::{parse_entry_header, PackEntry};
use crate::index::PackIndex;
use crate::{
    is_supported_pack_version, PackEntryType, PackError, PackedObject, MAX_DELTA_CHAIN_DEPTH,
    PACK_HEADER_SIZE, PACK_SIGNATURE,
};

/// A memory-mapped packfile with its index.
pub struct PackFile {
    data: Mmap,
    index: PackIndex,
    pack_path: PathBuf,
    num_objects: u32,
    version: u32,
}

impl PackFile {
    /// Open a pack file and its associated index.
    ///
    /// Given a `.pack` file path, opens both the pack and its `.idx` file.
    pub fn open(pack_path: impl AsRef<Path>) -> Result<Self, PackError> {
        let pack_path = pack_path.as_ref().to_path_buf();

        // Derive .idx path from .pack path
        let idx_path = pack_path.with_extension("idx");

        let file = std::fs::File::open(&pack_path)?;
        let data = unsafe { Mmap::map(&file)? };

        // Validate pack header
        if data.len() < PACK_HEADER_SIZE {
            return Err(PackError::InvalidHeader("file too small".into()));
        }
        if &data[0..4] != PACK_SIGNATURE {
            return Err(PackError::InvalidHeader("bad PACK signature".into()));
        }
        let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if !is_supported_pack_version(version) {
            return Err(PackError::UnsupportedVersion(version));
        }
        let num_objects = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

        let index = PackIndex::open(&idx_path)?;

        // Validate object count matches between pack and index
        if index.num_objects() != num_objects {
            return Err(PackError::InvalidHeader(format!(
                "pack has {} objects but index has {}",
                num_objects,
                index.num_objects()
            )));
        }

        Ok(Self {
            data,
            index,
            pack_path,
            num_objects,
            version,
        })
    }

    /// Read an object by OID.
    ///
    /// Returns `None` if the OID is not in this pack.
    pub fn read_object(&self, oid: &ObjectId) -> Result<Option<PackedObject>, PackError> {
        match self.index.lookup(oid) {
            Some(offset) => self.read_at_offset(offset).map(Some),
            None => Ok(None),
        }
    }

    /// Read an object at a known offset in the pack.
    ///
    /// Resolves delta chains iteratively (not recursively) to handle
    /// arbitrary chain depths safely.
    pub fn read_at_offset(&self, offset: u64) -> Result<PackedObject, PackError> {
        self.read_at_offset_with_resolver(offset, |_| None)
    }

    /// Read an object by OID, with an external resolver for cross-pack REF_DELTA bases.
    ///
    /// The resolver is called when a REF_DELTA references a base OID not found in this pack.
    /// It should return the resolved base object's type and data if found externally.
    pub fn read_object_with_resolver(
        &self,
        oid: &ObjectId,
        resolver: impl Fn(&ObjectId) -> Option<(ObjectType, Vec<u8>)>,
    ) -> Result<Option<PackedObject>, PackError> {
        match self.index.lookup(oid) {
            Some(offset) => self.read_at_offset_with_resolver(offset, resolver).map(Some),
            None => Ok(None),
        }
    }

    /// Read an object at a known offset, with an external resolver for cross-pack REF_DELTA bases.
    fn read_at_offset_with_resolver(
        &self,
        offset: u64,
        resolver: impl Fn(&ObjectId) -> Option<(ObjectType, Vec<u8>)>,
    ) -> Result<PackedObject, PackError> {
        // Build the delta chain (innermost delta first, base last)
        let mut chain: Vec<(PackEntry, Vec<u8>)> = Vec::new();
        let mut current_offset = offset;

        for depth in 0..MAX_DELTA_CHAIN_DEPTH {
            let entry =
                parse_entry_header(&self.data[current_offset as usize..], current_offset)?;

            // Decompress the data
            let compressed = &self.data[entry.data_offset as usize..];
            let decompressed = decompress(compressed, entry.uncompressed_size, current_offset)?;

            match entry.entry_type {
                PackEntryType::Commit
                | PackEntryType::Tree
                | PackEntryType::Blob
                | PackEntryType::Tag => {
                    // Base object — resolve chain
                    let obj_type = entry.entry_type.to_object_type().expect("non-delta type");

                    // Apply delta chain in reverse order
                    let mut data = decompressed;
                    for (_, delta_data) in chain.iter().rev() {
                        data = crate::delta::apply::apply_delta(&data, delta_data)?;
                    }

                    return Ok(PackedObject { obj_type, data });
                }
                PackEntryType::OfsDelta { base_offset } => {
                    chain.push((entry, decompressed));
                    current_offset = base_offset;
                }
                PackEntryType::RefDelta { base_oid } => {
                    chain.push((entry, decompressed));
                    // Try the index within this pack first
                    if let Some(base_offset) = self.index.lookup(&base_oid) {
                        current_offset = base_offset;
                    } else if let Some((obj_type, base_data)) = resolver(&base_oid) {
                        // External resolver found the base — apply delta chain
                        let mut data = base_data;
                        for (_, delta_data) in chain.iter().rev() {
                            data = crate::delta::apply::apply_delta(&data, delta_data)?;
                        }
                        return Ok(PackedObject { obj_type, data });
                    } else {
                        return Err(PackError::MissingBase(base_oid));
                    }
                }
            }

            if depth + 1 >= MAX_DELTA_CHAIN_DEPTH {
                return Err(PackError::DeltaChainTooDeep {
                    offset,
                    max_depth: MAX_DELTA_CHAIN_DEPTH,
                });
            }
        }

        Err(PackError::DeltaChainTooDeep {
            offset,
            max_depth: MAX_DELTA_CHAIN_DEPTH,
        })
    }

    /// Check if this pack contains the given OID.
    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.index.lookup(oid).is_some()
    }

    /// Get the number of objects in this pack.
    pub fn num_objects(&self) -> u32 {
        self.num_objects
    }

    /// Pack format version, either 2 or 3.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Get the pack index.
    pub fn index(&self) -> &PackIndex {
        &self.index
    }

    /// Get the path to the .pack file.
    pub fn path(&self) -> &Path {
        &self.pack_path
    }

    /// Get the raw memory-mapped pack data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Decompress zlib data with an expected uncompressed size.
fn decompress(compressed: &[u8], expected_size: usize, offset: u64) -> Result<Vec<u8>, PackError> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut buf = Vec::with_capacity(expected_size);
    decoder
        .read_to_end(&mut buf)
        .map_err(|_| PackError::CorruptEntry(offset))?;
    Ok(buf)
}

/// Decompress zlib data and report how many compressed bytes the stream
/// consumed, so a caller walking a flat byte slice can find the next entry.
fn decompress_tracked(
    compressed: &[u8],
    expected_size: usize,
    offset: u64,
) -> Result<(Vec<u8>, u64), PackError> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut buf = Vec::with_capacity(expected_size);
    decoder
        .read_to_end(&mut buf)
        .map_err(|_| PackError::CorruptEntry(offset))?;
    Ok((buf, decoder.total_in()))
}

/// Walks every entry of a sealed pack in offset order, resolving each
/// entry's delta chain as it goes, and returns the `(oid, offset)` pairs
/// needed to build an index plus the pack's trailing checksum.
///
/// Unlike [`PackFile::open`] this does not require a `.idx` to already
/// exist — it is how the index gets built in the first place after a pack
/// is ingested. Because packs are written base-before-delta, a forward
/// scan resolves OFS_DELTA and same-pack REF_DELTA bases from entries
/// already visited; `resolver` is consulted only for REF_DELTA bases this
/// pack never defines (a thin pack completed against another pack).
pub fn scan_pack_for_index(
    pack_path: impl AsRef<Path>,
    resolver: impl Fn(&ObjectId) -> Option<(ObjectType, Vec<u8>)>,
) -> Result<(Vec<(ObjectId, u64)>, ObjectId), PackError> {
    let pack_path = pack_path.as_ref();
    let file = std::fs::File::open(pack_path)?;
    let data = unsafe { Mmap::map(&file)? };

    if data.len() < PACK_HEADER_SIZE + OID_LEN {
        return Err(PackError::InvalidHeader("file too small".into()));
    }
    if &data[0..4] != PACK_SIGNATURE {
        return Err(PackError::InvalidHeader("bad PACK signature".into()));
    }
    let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    if !is_supported_pack_version(version) {
        return Err(PackError::UnsupportedVersion(version));
    }
    let num_objects = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);
    let pack_checksum = ObjectId::from_bytes(&data[data.len() - OID_LEN..])?;

    let mut checksum_to_offset: HashMap<ObjectId, u64> = HashMap::new();
    let mut resolved_by_offset: HashMap<u64, (ObjectType, Vec<u8>)> = HashMap::new();
    let mut entries: Vec<(ObjectId, u64)> = Vec::with_capacity(num_objects as usize);

    let mut offset = PACK_HEADER_SIZE as u64;
    for _ in 0..num_objects {
        let entry_offset = offset;
        let entry = parse_entry_header(&data[offset as usize..], offset)?;
        let compressed = &data[entry.data_offset as usize..];
        let (payload, consumed) = decompress_tracked(compressed, entry.uncompressed_size, entry_offset)?;

        let (obj_type, content) = match entry.entry_type {
            PackEntryType::Commit | PackEntryType::Tree | PackEntryType::Blob | PackEntryType::Tag => {
                (entry.entry_type.to_object_type().expect("non-delta type"), payload)
            }
            PackEntryType::OfsDelta { base_offset } => {
                let (base_type, base_data) = resolved_by_offset
                    .get(&base_offset)
                    .cloned()
                    .ok_or(PackError::CorruptEntry(entry_offset))?;
                let data = crate::delta::apply::apply_delta(&base_data, &payload)?;
                (base_type, data)
            }
            PackEntryType::RefDelta { base_oid } => {
                let (base_type, base_data) = if let Some(&base_off) = checksum_to_offset.get(&base_oid) {
                    resolved_by_offset
                        .get(&base_off)
                        .cloned()
                        .expect("scanned base recorded before its dependents")
                } else if let Some(found) = resolver(&base_oid) {
                    found
                } else {
                    return Err(PackError::MissingBase(base_oid));
                };
                let data = crate::delta::apply::apply_delta(&base_data, &payload)?;
                (base_type, data)
            }
        };

        let oid = Hasher::hash_object(&obj_type.to_string(), &content);
        entries.push((oid, entry_offset));
        checksum_to_offset.insert(oid, entry_offset);
        resolved_by_offset.insert(entry_offset, (obj_type, content));

        offset = entry.data_offset + consumed;
    }

    Ok((entries, pack_checksum))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::{encode_copy, encode_insert, write_varint};
    use crate::entry::encode_entry_header;
    use crate::index::PackIndexWriter;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use git_hash::hasher::Hasher;
    use git_object::ObjectType;
    use std::io::Write;

    /// Build a minimal valid .pack + .idx pair in a temp directory.
    /// Returns the path to the .pack file.
    fn build_test_pack(dir: &Path, objects: &[(ObjectType, &[u8])]) -> (PathBuf, Vec<ObjectId>) {
        let pack_path = dir.join("test.pack");
        let idx_path = dir.join("test.idx");

        let mut pack_data = Vec::new();

        // Pack header
        pack_data.extend_from_slice(PACK_SIGNATURE);
        pack_data.extend_from_slice(&2u32.to_be_bytes());
        pack_data.extend_from_slice(&(objects.len() as u32).to_be_bytes());

        let mut entries: Vec<(ObjectId, u64)> = Vec::new();

        for (obj_type, content) in objects {
            let offset = pack_data.len() as u64;

            let type_num = match obj_type {
                ObjectType::Commit => 1,
                ObjectType::Tree => 2,
                ObjectType::Blob => 3,
                ObjectType::Tag => 4,
            };

            let header = encode_entry_header(type_num, content.len() as u64);
            let mut compressed = Vec::new();
            {
                let mut encoder = ZlibEncoder::new(&mut compressed, Compression::default());
                encoder.write_all(content).unwrap();
                encoder.finish().unwrap();
            }

            let oid = Hasher::hash_object(&obj_type.to_string(), content);

            pack_data.extend_from_slice(&header);
            pack_data.extend_from_slice(&compressed);

            entries.push((oid, offset));
        }

        // Pack trailer: SHA-1 of all preceding content
        let pack_checksum = Hasher::digest(&pack_data);
        pack_data.extend_from_slice(pack_checksum.as_bytes());

        std::fs::write(&pack_path, &pack_data).unwrap();

        let oids: Vec<ObjectId> = entries.iter().map(|(oid, _)| *oid).collect();
        PackIndexWriter::write_to_path(&idx_path, &entries, pack_checksum).unwrap();

        (pack_path, oids)
    }

    #[test]
    fn read_single_blob() {
        let dir = tempfile::tempdir().unwrap();
        let content = b"Hello, packfile world!";
        let (pack_path, oids) = build_test_pack(dir.path(), &[(ObjectType::Blob, content)]);

        let pack = PackFile::open(&pack_path).unwrap();
        assert_eq!(pack.num_objects(), 1);
        assert_eq!(pack.version(), 2);

        let obj = pack.read_object(&oids[0]).unwrap().unwrap();
        assert_eq!(obj.obj_type, ObjectType::Blob);
        assert_eq!(obj.data, content);
    }

    #[test]
    fn read_multiple_objects() {
        let dir = tempfile::tempdir().unwrap();
        let objects = vec![
            (ObjectType::Blob, b"blob content".as_slice()),
            (ObjectType::Blob, b"another blob".as_slice()),
            (ObjectType::Commit, b"tree 0000000000000000000000000000000000000000\nauthor Test <test@test.com> 0 +0000\ncommitter Test <test@test.com> 0 +0000\n\ntest commit\n".as_slice()),
        ];
        let (pack_path, oids) = build_test_pack(dir.path(), &objects);

        let pack = PackFile::open(&pack_path).unwrap();
        assert_eq!(pack.num_objects(), 3);

        for (i, (obj_type, content)) in objects.iter().enumerate() {
            let obj = pack.read_object(&oids[i]).unwrap().unwrap();
            assert_eq!(obj.obj_type, *obj_type);
            assert_eq!(obj.data, *content);
        }
    }

    #[test]
    fn contains_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let (pack_path, oids) = build_test_pack(dir.path(), &[(ObjectType::Blob, b"test")]);

        let pack = PackFile::open(&pack_path).unwrap();
        assert!(pack.contains(&oids[0]));

        let missing = ObjectId::from_hex("0000000000000000000000000000000000000001").unwrap();
        assert!(!pack.contains(&missing));
        assert_eq!(pack.read_object(&missing).unwrap(), None);
    }

    #[test]
    fn rejects_unsupported_version() {
        let dir = tempfile::tempdir().unwrap();
        let pack_path = dir.path().join("test.pack");
        let idx_path = dir.path().join("test.idx");

        let mut pack_data = Vec::new();
        pack_data.extend_from_slice(PACK_SIGNATURE);
        pack_data.extend_from_slice(&4u32.to_be_bytes()); // unsupported
        pack_data.extend_from_slice(&0u32.to_be_bytes());
        let checksum = Hasher::digest(&pack_data);
        pack_data.extend_from_slice(checksum.as_bytes());
        std::fs::write(&pack_path, &pack_data).unwrap();
        PackIndexWriter::write_to_path(&idx_path, &[], checksum).unwrap();

        let err = PackFile::open(&pack_path).unwrap_err();
        assert!(matches!(err, PackError::UnsupportedVersion(4)));
    }

    #[test]
    fn accepts_version_3() {
        let dir = tempfile::tempdir().unwrap();
        let pack_path = dir.path().join("test.pack");
        let idx_path = dir.path().join("test.idx");

        let mut pack_data = Vec::new();
        pack_data.extend_from_slice(PACK_SIGNATURE);
        pack_data.extend_from_slice(&3u32.to_be_bytes());
        pack_data.extend_from_slice(&0u32.to_be_bytes());
        let checksum = Hasher::digest(&pack_data);
        pack_data.extend_from_slice(checksum.as_bytes());
        std::fs::write(&pack_path, &pack_data).unwrap();
        PackIndexWriter::write_to_path(&idx_path, &[], checksum).unwrap();

        let pack = PackFile::open(&pack_path).unwrap();
        assert_eq!(pack.version(), 3);
    }

    /// Builds a packed ofs-delta object by hand from explicit copy/insert
    /// instructions, matching how a real delta-compressed entry is laid out,
    /// rather than computing a diff algorithmically.
    #[test]
    fn read_ofs_delta_object() {
        let dir = tempfile::tempdir().unwrap();
        let pack_path = dir.path().join("test.pack");
        let idx_path = dir.path().join("test.idx");

        // Base: "ABCDEFGH" -> Target: "ABCDZEFGH"
        // COPY(0,4) "ABCD" + INSERT("Z") + COPY(4,4) "EFGH"
        let base_content = b"ABCDEFGH";
        let target_content = b"ABCDZEFGH";

        let mut delta_bytes = Vec::new();
        delta_bytes.extend_from_slice(&write_varint(base_content.len()));
        delta_bytes.extend_from_slice(&write_varint(target_content.len()));
        delta_bytes.extend_from_slice(&encode_copy(0, 4));
        delta_bytes.extend_from_slice(&encode_insert(b"Z"));
        delta_bytes.extend_from_slice(&encode_copy(4, 4));

        let base_header = encode_entry_header(3, base_content.len() as u64); // blob
        let mut base_compressed = Vec::new();
        {
            let mut enc = ZlibEncoder::new(&mut base_compressed, Compression::default());
            enc.write_all(base_content).unwrap();
            enc.finish().unwrap();
        }

        let base_offset_in_pack = PACK_HEADER_SIZE as u64;
        let delta_offset_in_pack =
            PACK_HEADER_SIZE as u64 + base_header.len() as u64 + base_compressed.len() as u64;
        let negative_offset = delta_offset_in_pack - base_offset_in_pack;

        let delta_header = encode_entry_header(6, delta_bytes.len() as u64); // OFS_DELTA
        let ofs_encoded = crate::entry::encode_ofs_delta_offset(negative_offset);

        let mut delta_compressed = Vec::new();
        {
            let mut enc = ZlibEncoder::new(&mut delta_compressed, Compression::default());
            enc.write_all(&delta_bytes).unwrap();
            enc.finish().unwrap();
        }

        let mut pack_data = Vec::new();
        pack_data.extend_from_slice(PACK_SIGNATURE);
        pack_data.extend_from_slice(&2u32.to_be_bytes());
        pack_data.extend_from_slice(&2u32.to_be_bytes()); // 2 objects

        let base_entry_offset = pack_data.len() as u64;
        pack_data.extend_from_slice(&base_header);
        pack_data.extend_from_slice(&base_compressed);

        let delta_entry_offset = pack_data.len() as u64;
        pack_data.extend_from_slice(&delta_header);
        pack_data.extend_from_slice(&ofs_encoded);
        pack_data.extend_from_slice(&delta_compressed);

        let pack_checksum = Hasher::digest(&pack_data);
        pack_data.extend_from_slice(pack_checksum.as_bytes());

        std::fs::write(&pack_path, &pack_data).unwrap();

        let base_oid = Hasher::hash_object("blob", base_content);
        let target_oid = Hasher::hash_object("blob", target_content);

        PackIndexWriter::write_to_path(
            &idx_path,
            &[(base_oid, base_entry_offset), (target_oid, delta_entry_offset)],
            pack_checksum,
        )
        .unwrap();

        let pack = PackFile::open(&pack_path).unwrap();
        assert_eq!(pack.num_objects(), 2);

        let base_obj = pack.read_object(&base_oid).unwrap().unwrap();
        assert_eq!(base_obj.data, base_content.as_slice());

        let delta_obj = pack.read_object(&target_oid).unwrap().unwrap();
        assert_eq!(delta_obj.obj_type, ObjectType::Blob);
        assert_eq!(delta_obj.data, target_content.as_slice());
    }

    #[test]
    fn scan_builds_same_index_as_reference() {
        let dir = tempfile::tempdir().unwrap();
        let objects = vec![
            (ObjectType::Blob, b"blob one".as_slice()),
            (ObjectType::Blob, b"blob two".as_slice()),
            (ObjectType::Tree, b"100644 a.txt\0\x01\x02\x03\x04\x05\x06\x07\x08\x09\x0a\x0b\x0c\x0d\x0e\x0f\x10\x11\x12\x13".as_slice()),
        ];
        let (pack_path, oids) = build_test_pack(dir.path(), &objects);

        let (entries, pack_checksum) = scan_pack_for_index(&pack_path, |_| None).unwrap();
        assert_eq!(entries.len(), 3);

        let mut scanned: Vec<ObjectId> = entries.iter().map(|(oid, _)| *oid).collect();
        scanned.sort();
        let mut expected = oids.clone();
        expected.sort();
        assert_eq!(scanned, expected);

        let pack_bytes = std::fs::read(&pack_path).unwrap();
        assert_eq!(pack_checksum.as_bytes(), &pack_bytes[pack_bytes.len() - OID_LEN..]);
    }

    #[test]
    fn scan_resolves_ofs_delta_chain() {
        let dir = tempfile::tempdir().unwrap();
        let pack_path = dir.path().join("test.pack");

        let base_content = b"ABCDEFGH";
        let target_content = b"ABCDZEFGH";

        let mut delta_bytes = Vec::new();
        delta_bytes.extend_from_slice(&write_varint(base_content.len()));
        delta_bytes.extend_from_slice(&write_varint(target_content.len()));
        delta_bytes.extend_from_slice(&encode_copy(0, 4));
        delta_bytes.extend_from_slice(&encode_insert(b"Z"));
        delta_bytes.extend_from_slice(&encode_copy(4, 4));

        let base_header = encode_entry_header(3, base_content.len() as u64);
        let mut base_compressed = Vec::new();
        {
            let mut enc = ZlibEncoder::new(&mut base_compressed, Compression::default());
            enc.write_all(base_content).unwrap();
            enc.finish().unwrap();
        }

        let base_offset_in_pack = PACK_HEADER_SIZE as u64;
        let delta_offset_in_pack =
            PACK_HEADER_SIZE as u64 + base_header.len() as u64 + base_compressed.len() as u64;
        let negative_offset = delta_offset_in_pack - base_offset_in_pack;

        let delta_header = encode_entry_header(6, delta_bytes.len() as u64);
        let ofs_encoded = crate::entry::encode_ofs_delta_offset(negative_offset);

        let mut delta_compressed = Vec::new();
        {
            let mut enc = ZlibEncoder::new(&mut delta_compressed, Compression::default());
            enc.write_all(&delta_bytes).unwrap();
            enc.finish().unwrap();
        }

        let mut pack_data = Vec::new();
        pack_data.extend_from_slice(PACK_SIGNATURE);
        pack_data.extend_from_slice(&2u32.to_be_bytes());
        pack_data.extend_from_slice(&2u32.to_be_bytes());
        pack_data.extend_from_slice(&base_header);
        pack_data.extend_from_slice(&base_compressed);
        pack_data.extend_from_slice(&delta_header);
        pack_data.extend_from_slice(&ofs_encoded);
        pack_data.extend_from_slice(&delta_compressed);
        let pack_checksum = Hasher::digest(&pack_data);
        pack_data.extend_from_slice(pack_checksum.as_bytes());
        std::fs::write(&pack_path, &pack_data).unwrap();

        let base_oid = Hasher::hash_object("blob", base_content);
        let target_oid = Hasher::hash_object("blob", target_content);

        let (entries, _) = scan_pack_for_index(&pack_path, |_| None).unwrap();
        let found: HashMap<ObjectId, u64> = entries.into_iter().collect();
        assert!(found.contains_key(&base_oid));
        assert!(found.contains_key(&target_oid));
    }

    #[test]
    fn scan_uses_external_resolver_for_missing_ref_delta_base() {
        let dir = tempfile::tempdir().unwrap();
        let pack_path = dir.path().join("test.pack");

        let base_content = b"ABCDEFGH";
        let target_content = b"ABCDZEFGH";
        let base_oid = Hasher::hash_object("blob", base_content);

        let mut delta_bytes = Vec::new();
        delta_bytes.extend_from_slice(&write_varint(base_content.len()));
        delta_bytes.extend_from_slice(&write_varint(target_content.len()));
        delta_bytes.extend_from_slice(&encode_copy(0, 4));
        delta_bytes.extend_from_slice(&encode_insert(b"Z"));
        delta_bytes.extend_from_slice(&encode_copy(4, 4));

        let delta_header = encode_entry_header(7, delta_bytes.len() as u64); // REF_DELTA
        let mut delta_compressed = Vec::new();
        {
            let mut enc = ZlibEncoder::new(&mut delta_compressed, Compression::default());
            enc.write_all(&delta_bytes).unwrap();
            enc.finish().unwrap();
        }

        let mut pack_data = Vec::new();
        pack_data.extend_from_slice(PACK_SIGNATURE);
        pack_data.extend_from_slice(&2u32.to_be_bytes());
        pack_data.extend_from_slice(&1u32.to_be_bytes());
        pack_data.extend_from_slice(&delta_header);
        pack_data.extend_from_slice(base_oid.as_bytes());
        pack_data.extend_from_slice(&delta_compressed);
        let pack_checksum = Hasher::digest(&pack_data);
        pack_data.extend_from_slice(pack_checksum.as_bytes());
        std::fs::write(&pack_path, &pack_data).unwrap();

        let base_content_owned = base_content.to_vec();
        let (entries, _) = scan_pack_for_index(&pack_path, move |oid| {
            if *oid == base_oid {
                Some((ObjectType::Blob, base_content_owned.clone()))
            } else {
                None
            }
        })
        .unwrap();

        assert_eq!(entries.len(), 1);
        let target_oid = Hasher::hash_object("blob", target_content);
        assert_eq!(entries[0].0, target_oid);
    }

    #[test]
    fn scan_reports_missing_ref_delta_base() {
        let dir = tempfile::tempdir().unwrap();
        let pack_path = dir.path().join("test.pack");

        let delta_bytes = {
            let mut d = Vec::new();
            d.extend_from_slice(&write_varint(8));
            d.extend_from_slice(&write_varint(8));
            d.extend_from_slice(&encode_copy(0, 8));
            d
        };
        let missing_base = ObjectId::from_hex("00ff0000000000000000000000000000000000ab").unwrap();
        let delta_header = encode_entry_header(7, delta_bytes.len() as u64);
        let mut delta_compressed = Vec::new();
        {
            let mut enc = ZlibEncoder::new(&mut delta_compressed, Compression::default());
            enc.write_all(&delta_bytes).unwrap();
            enc.finish().unwrap();
        }

        let mut pack_data = Vec::new();
        pack_data.extend_from_slice(PACK_SIGNATURE);
        pack_data.extend_from_slice(&2u32.to_be_bytes());
        pack_data.extend_from_slice(&1u32.to_be_bytes());
        pack_data.extend_from_slice(&delta_header);
        pack_data.extend_from_slice(missing_base.as_bytes());
        pack_data.extend_from_slice(&delta_compressed);
        let pack_checksum = Hasher::digest(&pack_data);
        pack_data.extend_from_slice(pack_checksum.as_bytes());
        std::fs::write(&pack_path, &pack_data).unwrap();

        let err = scan_pack_for_index(&pack_path, |_| None).unwrap_err();
        assert!(matches!(err, PackError::MissingBase(oid) if oid == missing_base));
    }
}
