//! The Pack Manager / Object Store: a single interface to read and write
//! objects across loose storage and ingested packfiles.
//!
//! This is the component every higher layer (checkout, the clone CLI) goes
//! through to resolve a checksum into bytes. It owns the ingestion pipeline
//! end to end — handing a pack-fetch response body to [`ObjectDatabase::ingest`]
//! runs the Pack Stream Ingestor, a full sequential scan to resolve every
//! entry's delta chain, and the v1 index writer — and it is the only
//! component allowed to cross between packs while resolving a ref-delta
//! base.

mod search;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use git_hash::ObjectId;
use git_loose::LooseObjectStore;
use git_object::cache::ObjectCache;
use git_object::{Object, ObjectType};
use git_pack::ingest::IngestConfig;
use git_pack::pack::{scan_pack_for_index, PackFile};
use git_pack::index::PackIndexWriter;

pub use error::OdbError;

mod error {
    use git_hash::ObjectId;

    #[derive(Debug, thiserror::Error)]
    pub enum OdbError {
        #[error("object not found: {0}")]
        NotFound(ObjectId),

        #[error("corrupt object {oid}: {reason}")]
        Corrupt { oid: ObjectId, reason: String },

        #[error(transparent)]
        Loose(#[from] git_loose::LooseError),

        #[error(transparent)]
        Pack(#[from] git_pack::PackError),

        #[error(transparent)]
        Io(#[from] std::io::Error),
    }
}

/// Lightweight object info (header only, no content).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub obj_type: ObjectType,
    pub size: usize,
}

/// Unified object database: loose storage plus every pack ingested into it.
pub struct ObjectDatabase {
    loose: LooseObjectStore,
    packs: RwLock<Vec<PackFile>>,
    cache: Mutex<ObjectCache>,
    objects_dir: PathBuf,
    ingest_config: IngestConfig,
}

impl ObjectDatabase {
    /// Open the object database at the given `objects/` directory, discovering
    /// any packs already present under `objects/pack/`.
    pub fn open(objects_dir: impl AsRef<Path>) -> Result<Self, OdbError> {
        Self::with_ingest_config(objects_dir, IngestConfig::default())
    }

    /// Open with a non-default pack size limit for future `ingest` calls.
    pub fn with_ingest_config(
        objects_dir: impl AsRef<Path>,
        ingest_config: IngestConfig,
    ) -> Result<Self, OdbError> {
        let objects_dir = objects_dir.as_ref().to_path_buf();
        let loose = LooseObjectStore::open(&objects_dir);
        let packs = Self::discover_packs(&objects_dir)?;

        Ok(Self {
            loose,
            packs: RwLock::new(packs),
            cache: Mutex::new(ObjectCache::new(1024)),
            objects_dir,
            ingest_config,
        })
    }

    /// Ingest a pack stream (the body of a `git-upload-pack` response):
    /// validates and writes the pack, resolves every entry, writes its v1
    /// index, and registers the opened pack for lookups. Returns the pack's
    /// trailing checksum.
    pub fn ingest<R: Read>(&self, reader: R) -> Result<ObjectId, OdbError> {
        let pack_dir = self.objects_dir.join("pack");
        std::fs::create_dir_all(&pack_dir)?;

        let ingested = git_pack::ingest::ingest_pack_stream(reader, &pack_dir, &self.ingest_config)?;

        let entries = {
            let packs = self.packs.read().unwrap();
            let resolver = |base_oid: &ObjectId| self.resolve_external(&packs, base_oid);
            let (entries, _) = scan_pack_for_index(&ingested.pack_path, resolver)?;
            entries
        };

        let idx_path = ingested.pack_path.with_extension("idx");
        PackIndexWriter::write_to_path(&idx_path, &entries, ingested.checksum)?;

        let pack = PackFile::open(&ingested.pack_path)?;
        self.packs.write().unwrap().insert(0, pack);

        Ok(ingested.checksum)
    }

    /// Resolve a checksum to its type and content, searching ingested packs
    /// before falling back to loose storage.
    pub fn object(&self, oid: &ObjectId) -> Result<Option<(ObjectType, Vec<u8>)>, OdbError> {
        search::find_packed_or_loose(self, oid)
    }

    /// Resolve a checksum to a parsed [`Object`].
    pub fn read(&self, oid: &ObjectId) -> Result<Option<Object>, OdbError> {
        match self.object(oid)? {
            Some((obj_type, content)) => {
                let obj =
                    Object::parse_content(obj_type, &content).map_err(|e| OdbError::Corrupt {
                        oid: *oid,
                        reason: e.to_string(),
                    })?;
                Ok(Some(obj))
            }
            None => Ok(None),
        }
    }

    /// Resolve a checksum to a parsed [`Object`], consulting (and populating) the
    /// in-memory LRU cache first.
    pub fn read_cached(&self, oid: &ObjectId) -> Result<Option<Object>, OdbError> {
        {
            let mut cache = self.cache.lock().unwrap();
            if let Some(obj) = cache.get(oid) {
                return Ok(Some(obj.clone()));
            }
        }

        let obj = self.read(oid)?;

        if let Some(ref obj) = obj {
            self.cache.lock().unwrap().insert(*oid, obj.clone());
        }

        Ok(obj)
    }

    /// Read just the header (type + size) without materializing content.
    pub fn read_header(&self, oid: &ObjectId) -> Result<Option<ObjectInfo>, OdbError> {
        search::find_header(self, oid)
    }

    /// Check if an object exists in either packed or loose storage.
    pub fn object_exists(&self, oid: &ObjectId) -> bool {
        search::object_exists(self, oid)
    }

    /// Alias for [`ObjectDatabase::object_exists`].
    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.object_exists(oid)
    }

    /// Write a new object to loose storage (idempotent).
    pub fn write(&self, obj: &Object) -> Result<ObjectId, OdbError> {
        Ok(self.loose.write(obj)?)
    }

    /// Write raw content with a known type to loose storage (idempotent).
    pub fn write_raw(&self, obj_type: ObjectType, content: &[u8]) -> Result<ObjectId, OdbError> {
        Ok(self.loose.write_raw(obj_type, content)?)
    }

    /// Materialize every entry of the named pack as a loose object.
    /// Objects already present loose are left untouched (idempotent).
    pub fn unpack(&self, pack_checksum: ObjectId) -> Result<(), OdbError> {
        let packs = self.packs.read().unwrap();
        let pack = packs
            .iter()
            .find(|p| {
                p.index()
                    .pack_checksum()
                    .map(|c| c == pack_checksum)
                    .unwrap_or(false)
            })
            .ok_or(OdbError::NotFound(pack_checksum))?;

        for record in pack.index().iter()? {
            if self.loose.contains(&record.oid) {
                continue;
            }
            let resolver = |base_oid: &ObjectId| self.resolve_external(&packs, base_oid);
            let packed = pack
                .read_object_with_resolver(&record.oid, resolver)?
                .expect("oid came from this pack's own index");
            self.loose.write_raw(packed.obj_type, &packed.data)?;
        }

        Ok(())
    }

    /// Refresh the set of known packs (call after an external process drops
    /// a new pack into `objects/pack/`).
    pub fn refresh(&self) -> Result<(), OdbError> {
        let new_packs = Self::discover_packs(&self.objects_dir)?;
        *self.packs.write().unwrap() = new_packs;
        Ok(())
    }

    /// Iterate over every known OID across loose storage and all packs.
    pub fn iter_all_oids(
        &self,
    ) -> Result<Box<dyn Iterator<Item = Result<ObjectId, OdbError>> + '_>, OdbError> {
        let loose_iter = self.loose.iter()?.map(|r| r.map_err(OdbError::from));

        let packs = self.packs.read().unwrap();
        let mut pack_oids: Vec<Result<ObjectId, OdbError>> = Vec::new();
        for pack in packs.iter() {
            for record in pack.index().iter()? {
                pack_oids.push(Ok(record.oid));
            }
        }

        Ok(Box::new(loose_iter.chain(pack_oids)))
    }

    /// Path to the `objects/` directory this database was opened on.
    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    /// Look for `base_oid` outside the pack currently being scanned: loose
    /// storage first, then every other already-open pack. Used to complete
    /// a ref-delta whose base this pack does not itself define.
    fn resolve_external(&self, packs: &[PackFile], base_oid: &ObjectId) -> Option<(ObjectType, Vec<u8>)> {
        if let Ok(Some(obj)) = self.loose.read(base_oid) {
            return Some((obj.object_type(), obj.serialize_content()));
        }
        for pack in packs {
            if let Ok(Some(packed)) = pack.read_object(base_oid) {
                return Some((packed.obj_type, packed.data));
            }
        }
        None
    }

    /// Discover pack files in `objects/pack/`, newest first (matching C git's
    /// preference for recently written packs when several cover the same object).
    fn discover_packs(objects_dir: &Path) -> Result<Vec<PackFile>, OdbError> {
        let pack_dir = objects_dir.join("pack");
        if !pack_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries: Vec<_> = std::fs::read_dir(&pack_dir)?
            .filter_map(|e| e.ok())
            .collect();

        entries.sort_by(|a, b| {
            let a_time = a.metadata().and_then(|m| m.modified()).ok();
            let b_time = b.metadata().and_then(|m| m.modified()).ok();
            b_time.cmp(&a_time)
        });

        let mut packs = Vec::new();
        for entry in entries {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "pack") {
                if let Ok(pack) = PackFile::open(&path) {
                    packs.push(pack);
                }
            }
        }

        Ok(packs)
    }
}
