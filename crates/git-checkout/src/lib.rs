//! Checkout: materializes a resolved tree into a working directory.
//!
//! Walks a tree depth-first through the object database, creating
//! directories, regular/executable files, and symlinks as it goes. Existing
//! files at a target path are overwritten; the walk is not atomic across
//! files, so a failure partway through leaves a partially populated tree.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use git_hash::ObjectId;
use git_object::{FileMode, Object};
use git_odb::ObjectDatabase;

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("tree object {0} not found")]
    MissingTree(ObjectId),

    #[error("expected tree object at {0}, found a different type")]
    NotATree(ObjectId),

    #[error("expected blob object at {0}, found a different type")]
    NotABlob(ObjectId),

    #[error("unsupported tree entry mode at {path}: {mode:?}")]
    UnsupportedMode { path: PathBuf, mode: FileMode },

    #[error(transparent)]
    Odb(#[from] git_odb::OdbError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Counts of what a checkout actually wrote, for progress reporting.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutStats {
    pub files_written: usize,
    pub dirs_created: usize,
}

/// Walk `tree_oid` depth-first and write its contents under `target_dir`.
///
/// `target_dir` is created if it does not already exist.
pub fn checkout_tree(
    odb: &ObjectDatabase,
    tree_oid: &ObjectId,
    target_dir: &Path,
) -> Result<CheckoutStats, CheckoutError> {
    fs::create_dir_all(target_dir)?;
    let mut stats = CheckoutStats::default();
    checkout_tree_into(odb, tree_oid, target_dir, &mut stats)?;
    Ok(stats)
}

fn checkout_tree_into(
    odb: &ObjectDatabase,
    tree_oid: &ObjectId,
    dir: &Path,
    stats: &mut CheckoutStats,
) -> Result<(), CheckoutError> {
    let tree = match odb.read(tree_oid)? {
        Some(Object::Tree(tree)) => tree,
        Some(_) => return Err(CheckoutError::NotATree(*tree_oid)),
        None => return Err(CheckoutError::MissingTree(*tree_oid)),
    };

    for entry in tree.iter() {
        let entry_path = dir.join(bytes_to_path_component(&entry.name));

        match entry.mode {
            FileMode::Tree => {
                fs::create_dir_all(&entry_path)?;
                stats.dirs_created += 1;
                checkout_tree_into(odb, &entry.oid, &entry_path, stats)?;
            }
            FileMode::Regular | FileMode::Executable => {
                let content = read_blob(odb, &entry.oid)?;
                write_file(&entry_path, &content, entry.mode == FileMode::Executable)?;
                stats.files_written += 1;
            }
            FileMode::Symlink => {
                let target = read_blob(odb, &entry.oid)?;
                write_symlink(&entry_path, &target)?;
                stats.files_written += 1;
            }
            other => {
                return Err(CheckoutError::UnsupportedMode {
                    path: entry_path,
                    mode: other,
                });
            }
        }
    }

    Ok(())
}

fn read_blob(odb: &ObjectDatabase, oid: &ObjectId) -> Result<Vec<u8>, CheckoutError> {
    match odb.read(oid)? {
        Some(Object::Blob(blob)) => Ok(blob.data),
        Some(_) => Err(CheckoutError::NotABlob(*oid)),
        None => Err(CheckoutError::MissingTree(*oid)),
    }
}

#[cfg(unix)]
fn bytes_to_path_component(bytes: &[u8]) -> &Path {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    Path::new(OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn bytes_to_path_component(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

fn write_file(path: &Path, content: &[u8], executable: bool) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = if executable { 0o755 } else { 0o644 };
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    {
        let _ = executable;
    }
    Ok(())
}

#[cfg(unix)]
fn write_symlink(path: &Path, target: &[u8]) -> io::Result<()> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    if path.symlink_metadata().is_ok() {
        fs::remove_file(path)?;
    }
    std::os::unix::fs::symlink(OsStr::from_bytes(target), path)
}

#[cfg(not(unix))]
fn write_symlink(path: &Path, target: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    if path.symlink_metadata().is_ok() {
        fs::remove_file(path)?;
    }
    let target = String::from_utf8_lossy(target).into_owned();
    std::os::windows::fs::symlink_file(target, path)
}

/// Write the `HEAD` file at the repository's `.git` directory, pointing at
/// the default branch. The discovered remote default branch name is not
/// otherwise tracked by this system, so `HEAD` always names `refs/heads/main`.
pub fn write_head_file(git_dir: &Path) -> io::Result<()> {
    fs::create_dir_all(git_dir)?;
    fs::write(git_dir.join("HEAD"), b"ref: refs/heads/main\n")
}
