//! `gitr clone <url> [directory]`
//!
//! Drives the whole pipeline end to end: ref discovery, the pack request,
//! ingestion (pack stream validation, delta resolution, index build), and
//! checkout. This is the only surface this crate exposes — everything else
//! the original `git` binary does (loose-object plumbing, ref/branch
//! management, the rest of the porcelain) is out of scope.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;

use git_object::Object;
use git_odb::ObjectDatabase;
use git_protocol::discovery::parse_ref_advertisement;
use git_protocol::request::build_want_request;
use git_transport::HttpTransport;
use git_utils::progress::Progress;

#[derive(Args)]
pub struct CloneArgs {
    /// Repository URL to clone.
    repository: String,

    /// Destination directory. Defaults to the last path segment of the URL
    /// with a trailing `.git` stripped.
    directory: Option<PathBuf>,

    /// Suppress progress output.
    #[arg(short, long)]
    quiet: bool,
}

pub fn run(args: &CloneArgs) -> Result<()> {
    let dest = match &args.directory {
        Some(dir) => dir.clone(),
        None => infer_directory(&args.repository)?,
    };

    if dest.exists() && std::fs::read_dir(&dest)?.next().is_some() {
        bail!(
            "destination path '{}' already exists and is not an empty directory",
            dest.display()
        );
    }

    if !args.quiet {
        eprintln!("Cloning into '{}'...", dest.display());
    }

    let git_dir = dest.join(".git");
    let objects_dir = git_dir.join("objects");
    std::fs::create_dir_all(&objects_dir)?;

    let transport = HttpTransport::new(args.repository.as_str());

    let advert_response = transport
        .discover_refs()
        .with_context(|| format!("discovering refs at {}", args.repository))?;
    let advertisement = parse_ref_advertisement(
        advert_response.content_type.as_deref(),
        &advert_response.body,
    )?;

    if advertisement.refs.is_empty() {
        if !args.quiet {
            eprintln!("warning: You appear to have cloned an empty repository.");
        }
        git_checkout::write_head_file(&git_dir)?;
        return Ok(());
    }

    let wants = advertisement.unique_wanted_ids();
    let request_body = build_want_request(&wants)?;

    let pack_response = transport
        .fetch_pack(request_body)
        .with_context(|| format!("fetching pack from {}", args.repository))?;

    let odb = ObjectDatabase::open(&objects_dir)?;

    let mut progress = (!args.quiet).then(|| Progress::new("Receiving objects", None));
    let pack_checksum = odb
        .ingest(Cursor::new(pack_response.body))
        .context("ingesting pack stream")?;
    if let Some(p) = progress.as_mut() {
        p.tick();
    }
    drop(progress);

    let head_oid = advertisement
        .head
        .context("remote advertised refs but no HEAD")?;

    let commit = match odb.read(&head_oid)? {
        Some(Object::Commit(commit)) => commit,
        Some(other) => bail!("HEAD {head_oid} is a {}, not a commit", other.object_type()),
        None => bail!("HEAD commit {head_oid} was not found in the fetched pack {pack_checksum}"),
    };

    let stats = git_checkout::checkout_tree(&odb, &commit.tree, &dest)
        .context("checking out working tree")?;
    git_checkout::write_head_file(&git_dir)?;

    if !args.quiet {
        eprintln!(
            "Checked out {} file(s) into {} director{}.",
            stats.files_written,
            stats.dirs_created,
            if stats.dirs_created == 1 { "y" } else { "ies" }
        );
    }

    Ok(())
}

fn infer_directory(url: &str) -> Result<PathBuf> {
    let last_segment = url.rsplit('/').next().unwrap_or(url);
    let name = last_segment.strip_suffix(".git").unwrap_or(last_segment);
    if name.is_empty() {
        bail!("cannot infer destination directory from '{url}'");
    }
    Ok(Path::new(name).to_path_buf())
}
