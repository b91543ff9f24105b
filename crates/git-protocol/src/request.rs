//! Pack Request Builder.
//!
//! Turns the ids a [`RefAdvertisement`](crate::discovery::RefAdvertisement)
//! says the client wants into the pkt-line body of the
//! `POST {url}/git-upload-pack` request: one `"want <hex-id>\n"` line per
//! unique id, a flush, then `"done\n"`.

use git_hash::ObjectId;

use crate::pktline::PktLineWriter;
use crate::ProtocolError;

/// Build the request body for the given set of wanted ids.
///
/// The caller is responsible for deduplicating and ordering `wants`
/// (typically via `RefAdvertisement::unique_wanted_ids`); this function
/// preserves whatever order it is given, so that repeated calls over the
/// same input produce byte-identical bodies.
pub fn build_want_request(wants: &[ObjectId]) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::new();
    {
        let mut w = PktLineWriter::new(&mut buf);
        for oid in wants {
            w.write_text(&format!("want {}", oid.to_hex()))?;
        }
        w.write_flush()?;
        w.write_text("done")?;
    }
    Ok(buf)
}
