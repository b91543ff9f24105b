//! Pkt-line framing: the line layer underneath the smart-HTTP protocol.
//!
//! A pkt-line is four ASCII hex digits giving the total line length
//! (including the four digits themselves), followed by that many minus
//! four bytes of payload. The special line `"0000"` is a flush packet. This
//! layer has no opinion on what the payload bytes mean — that is up to
//! `discovery` and `request`.

use std::io::{Read, Write};

use crate::ProtocolError;

/// Data bytes plus the 4-byte length prefix must not exceed this.
pub const MAX_PKT_LEN: usize = 65520;

/// Largest payload a single pkt-line can carry.
pub const MAX_PKT_DATA_LEN: usize = MAX_PKT_LEN - 4;

/// A decoded pkt-line: either a data line or the flush terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PktLine {
    Data(Vec<u8>),
    Flush,
}

/// Reads pkt-lines off of `R` one at a time.
pub struct PktLineReader<R> {
    reader: R,
}

impl<R: Read> PktLineReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Read one pkt-line.
    pub fn read_pkt(&mut self) -> Result<PktLine, ProtocolError> {
        let mut len_buf = [0u8; 4];
        self.reader.read_exact(&mut len_buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ProtocolError::InvalidPktLine("unexpected EOF reading pkt-line length".into())
            } else {
                ProtocolError::Io(e)
            }
        })?;

        let len_str = std::str::from_utf8(&len_buf)
            .map_err(|_| ProtocolError::InvalidPktLine(format!("non-ASCII length {len_buf:?}")))?;
        let len = u16::from_str_radix(len_str, 16)
            .map_err(|_| ProtocolError::InvalidPktLine(format!("non-hex length {len_str:?}")))?;

        match len {
            0 => Ok(PktLine::Flush),
            1..=3 => Err(ProtocolError::InvalidPktLine(format!(
                "length {len} is shorter than the 4-byte header"
            ))),
            _ => {
                let data_len = (len as usize) - 4;
                let mut data = vec![0u8; data_len];
                self.reader.read_exact(&mut data)?;
                Ok(PktLine::Data(data))
            }
        }
    }

    /// Read consecutive data lines until (and consuming) a flush packet.
    pub fn read_until_flush(&mut self) -> Result<Vec<Vec<u8>>, ProtocolError> {
        let mut lines = Vec::new();
        loop {
            match self.read_pkt()? {
                PktLine::Data(data) => lines.push(data),
                PktLine::Flush => return Ok(lines),
            }
        }
    }
}

/// Writes pkt-lines to `W`.
pub struct PktLineWriter<W> {
    writer: W,
}

impl<W: Write> PktLineWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Write a data packet. Rejects payloads whose length plus the 4-byte
    /// header would exceed [`MAX_PKT_LEN`].
    pub fn write_line(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        if data.len() > MAX_PKT_DATA_LEN {
            return Err(ProtocolError::InvalidPktLine(format!(
                "{} bytes exceeds the {MAX_PKT_DATA_LEN}-byte pkt-line payload limit",
                data.len()
            )));
        }
        write!(self.writer, "{:04x}", data.len() + 4)?;
        self.writer.write_all(data)?;
        Ok(())
    }

    /// Write a data line, appending `\n` if the text doesn't already end in one.
    pub fn write_text(&mut self, text: &str) -> Result<(), ProtocolError> {
        if text.ends_with('\n') {
            self.write_line(text.as_bytes())
        } else {
            let mut buf = Vec::with_capacity(text.len() + 1);
            buf.extend_from_slice(text.as_bytes());
            buf.push(b'\n');
            self.write_line(&buf)
        }
    }

    pub fn write_flush(&mut self) -> Result<(), ProtocolError> {
        self.writer.write_all(b"0000")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), ProtocolError> {
        self.writer.flush()?;
        Ok(())
    }
}
