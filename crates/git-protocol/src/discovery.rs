//! Ref Discovery Client.
//!
//! Parses the response to `GET {url}/info/refs?service=git-upload-pack`:
//! a `"# service=git-upload-pack\n"` banner line, a flush, the advertised
//! refs (the first of which carries `HEAD` and the capability list after a
//! NUL byte), and a closing flush. A `^{}`-suffixed ref name marks a peeled
//! tag and is split out into its own table rather than left in `refs`.

use bstr::{BString, ByteSlice};
use git_hash::ObjectId;

use crate::pktline::{PktLine, PktLineReader};
use crate::ProtocolError;

const SERVICE_BANNER: &[u8] = b"# service=git-upload-pack\n";

/// Everything the client learns from one ref-discovery round trip.
#[derive(Debug, Clone, Default)]
pub struct RefAdvertisement {
    /// `HEAD`'s advertised id, if the remote has any refs at all.
    pub head: Option<ObjectId>,
    /// Every advertised ref, `HEAD` included, in advertisement order.
    pub refs: Vec<(ObjectId, BString)>,
    /// Peeled tag targets: `refs/tags/x^{}` becomes `("refs/tags/x", target_oid)`.
    pub peeled_refs: Vec<(BString, ObjectId)>,
    /// The capability list captured verbatim from the `HEAD` line.
    pub caps: String,
}

impl RefAdvertisement {
    /// Advertised ids for every non-peeled ref, each appearing once, in a
    /// stable order derived from the advertisement itself.
    pub fn unique_wanted_ids(&self) -> Vec<ObjectId> {
        let mut seen = std::collections::HashSet::new();
        let mut ids = Vec::new();
        for (oid, _) in &self.refs {
            if seen.insert(*oid) {
                ids.push(*oid);
            }
        }
        ids
    }
}

/// Parse the body of a ref-discovery response.
///
/// `content_type` must be `application/x-git-upload-pack-advertisement`; any
/// other value (including none) is rejected. An advertisement that flushes
/// immediately after the banner (an empty remote) yields a default,
/// all-empty `RefAdvertisement` rather than an error.
pub fn parse_ref_advertisement(
    content_type: Option<&str>,
    body: &[u8],
) -> Result<RefAdvertisement, ProtocolError> {
    match content_type {
        Some("application/x-git-upload-pack-advertisement") => {}
        other => {
            return Err(ProtocolError::UnexpectedContentType(
                other.map(str::to_string),
            ))
        }
    }

    let mut reader = PktLineReader::new(body);

    match reader.read_pkt()? {
        PktLine::Data(line) if line == SERVICE_BANNER => {}
        PktLine::Data(line) => {
            return Err(ProtocolError::Protocol(format!(
                "expected service banner, got {:?}",
                line.as_bstr()
            )))
        }
        PktLine::Flush => {
            return Err(ProtocolError::Protocol(
                "expected service banner before flush".into(),
            ))
        }
    }

    match reader.read_pkt()? {
        PktLine::Flush => {}
        PktLine::Data(line) => {
            return Err(ProtocolError::Protocol(format!(
                "expected flush after service banner, got {:?}",
                line.as_bstr()
            )))
        }
    }

    let lines = reader.read_until_flush()?;
    if lines.is_empty() {
        return Ok(RefAdvertisement::default());
    }

    let mut advert = RefAdvertisement::default();

    for (i, line) in lines.iter().enumerate() {
        let line = strip_trailing_newline(line);
        let (id_and_name, caps) = if i == 0 {
            match line.find_byte(0) {
                Some(nul) => (&line[..nul], Some(&line[nul + 1..])),
                None => (line, None),
            }
        } else {
            (line, None)
        };

        let mut parts = id_and_name.splitn(2, |&b| b == b' ');
        let hex = parts
            .next()
            .ok_or_else(|| ProtocolError::Protocol("empty ref advertisement line".into()))?;
        let name = parts
            .next()
            .ok_or_else(|| ProtocolError::Protocol("ref line missing a name".into()))?;

        let hex = std::str::from_utf8(hex)
            .map_err(|_| ProtocolError::Protocol("non-ASCII object id".into()))?;
        let oid = ObjectId::from_hex(hex)?;

        if let Some(caps) = caps {
            advert.caps = String::from_utf8_lossy(caps).into_owned();
        }

        if name == b"HEAD" {
            advert.head = Some(oid);
        }

        if let Some(base) = name.strip_suffix(b"^{}") {
            advert.peeled_refs.push((BString::from(base), oid));
        } else {
            advert.refs.push((oid, BString::from(name)));
        }
    }

    Ok(advert)
}

fn strip_trailing_newline(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\n").unwrap_or(line)
}
