//! Response body streams.
//!
//! [`BodyStream`] is the byte-stream capability every response body exposes.
//! Bodies that cannot support an operation (seeking a socket, reading a
//! write-only sink) answer with neutral values instead of failing, so any
//! body can stand in for any other.

use crate::error::{DispatchError, DispatchResult};
use bytes::{Bytes, BytesMut};
use std::fmt;
use std::io::SeekFrom;

/// Byte-stream capability of a response body.
///
/// `Display` renders the whole content of the stream (empty when the stream
/// is not readable) without moving the cursor.
pub trait BodyStream: fmt::Display + fmt::Debug + Send + Sync {
    /// Returns whether the stream can be read.
    fn is_readable(&self) -> bool;

    /// Reads up to `len` bytes from the current position.
    fn read(&mut self, len: usize) -> DispatchResult<Bytes>;

    /// Returns the remaining content from the current position.
    fn contents(&mut self) -> DispatchResult<Bytes>;

    /// Returns whether the stream accepts writes.
    fn is_writable(&self) -> bool;

    /// Writes `data` and returns how many bytes were written.
    fn write(&mut self, data: &[u8]) -> DispatchResult<usize>;

    /// Returns whether the stream supports seeking.
    fn is_seekable(&self) -> bool;

    /// Moves the cursor.
    fn seek(&mut self, pos: SeekFrom) -> DispatchResult<()>;

    /// Moves the cursor back to the start.
    fn rewind(&mut self) -> DispatchResult<()> {
        self.seek(SeekFrom::Start(0))
    }

    /// Returns whether the cursor is at the end of the stream.
    fn eof(&self) -> bool;

    /// Returns the size in bytes, if known.
    fn size(&self) -> Option<u64>;

    /// Returns the cursor position.
    fn tell(&self) -> u64;

    /// Returns stream metadata, or a single key when `key` is given.
    fn metadata(&self, key: Option<&str>) -> Option<serde_json::Value>;

    /// Closes the stream and releases what it owns.
    fn close(&mut self);

    /// Separates the underlying content from the stream.
    ///
    /// The stream is unusable afterwards.
    fn detach(&mut self) -> Option<Bytes>;

    /// Returns the whole content without moving the cursor.
    fn to_bytes(&self) -> Bytes;
}

/// An in-memory, readable, writable and seekable body.
///
/// This is the default body of a response. Writes happen at the cursor, so
/// a body created with [`BufferedBody::with_content`] appends further writes.
#[derive(Debug, Clone)]
pub struct BufferedBody {
    buf: Option<BytesMut>,
    position: usize,
}

impl BufferedBody {
    /// Creates an empty body.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Some(BytesMut::new()),
            position: 0,
        }
    }

    /// Creates a body holding `content`, with the cursor at its end.
    #[must_use]
    pub fn with_content(content: impl Into<Bytes>) -> Self {
        let content: Bytes = content.into();
        let position = content.len();
        Self {
            buf: Some(BytesMut::from(&content[..])),
            position,
        }
    }

    fn attached(&self) -> DispatchResult<&BytesMut> {
        self.buf
            .as_ref()
            .ok_or_else(|| DispatchError::stream("stream is detached"))
    }

    fn attached_mut(&mut self) -> DispatchResult<&mut BytesMut> {
        self.buf
            .as_mut()
            .ok_or_else(|| DispatchError::stream("stream is detached"))
    }
}

impl Default for BufferedBody {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BufferedBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.buf {
            Some(buf) => f.write_str(&String::from_utf8_lossy(buf)),
            None => Ok(()),
        }
    }
}

impl BodyStream for BufferedBody {
    fn is_readable(&self) -> bool {
        self.buf.is_some()
    }

    fn read(&mut self, len: usize) -> DispatchResult<Bytes> {
        let position = self.position;
        let buf = self.attached()?;
        let end = position.saturating_add(len).min(buf.len());
        let chunk = Bytes::copy_from_slice(&buf[position.min(end)..end]);
        self.position = end;
        Ok(chunk)
    }

    fn contents(&mut self) -> DispatchResult<Bytes> {
        let remaining = self.attached()?.len().saturating_sub(self.position);
        self.read(remaining)
    }

    fn is_writable(&self) -> bool {
        self.buf.is_some()
    }

    fn write(&mut self, data: &[u8]) -> DispatchResult<usize> {
        let position = self.position;
        let buf = self.attached_mut()?;
        let overlap = buf.len().saturating_sub(position).min(data.len());
        buf[position..position + overlap].copy_from_slice(&data[..overlap]);
        buf.extend_from_slice(&data[overlap..]);
        self.position = position + data.len();
        Ok(data.len())
    }

    fn is_seekable(&self) -> bool {
        self.buf.is_some()
    }

    fn seek(&mut self, pos: SeekFrom) -> DispatchResult<()> {
        let len = self.attached()?.len();
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(offset) => self.position as i128 + i128::from(offset),
            SeekFrom::End(offset) => len as i128 + i128::from(offset),
        };
        if target < 0 || target > len as i128 {
            return Err(DispatchError::stream(format!(
                "cannot seek to {target}, stream holds {len} bytes"
            )));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            self.position = target as usize;
        }
        Ok(())
    }

    fn eof(&self) -> bool {
        self.buf
            .as_ref()
            .map_or(true, |buf| self.position >= buf.len())
    }

    fn size(&self) -> Option<u64> {
        self.buf.as_ref().map(|buf| buf.len() as u64)
    }

    fn tell(&self) -> u64 {
        self.position as u64
    }

    fn metadata(&self, key: Option<&str>) -> Option<serde_json::Value> {
        self.buf.as_ref()?;
        let metadata = serde_json::json!({
            "mode": "w+b",
            "seekable": true,
            "stream_type": "memory",
        });
        match key {
            Some(key) => metadata.get(key).cloned(),
            None => Some(metadata),
        }
    }

    fn close(&mut self) {
        self.buf = None;
        self.position = 0;
    }

    fn detach(&mut self) -> Option<Bytes> {
        self.position = 0;
        self.buf.take().map(BytesMut::freeze)
    }

    fn to_bytes(&self) -> Bytes {
        self.buf
            .as_ref()
            .map(|buf| Bytes::copy_from_slice(buf))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_appends_at_end() {
        let mut body = BufferedBody::with_content("Hello");
        assert_eq!(body.write(b", world").unwrap(), 7);
        assert_eq!(body.to_string(), "Hello, world");
        assert_eq!(body.size(), Some(12));
        assert!(body.eof());
    }

    #[test]
    fn test_read_after_rewind() {
        let mut body = BufferedBody::new();
        body.write(b"abcdef").unwrap();
        body.rewind().unwrap();

        assert_eq!(body.read(2).unwrap(), Bytes::from_static(b"ab"));
        assert_eq!(body.tell(), 2);
        assert_eq!(body.contents().unwrap(), Bytes::from_static(b"cdef"));
        assert!(body.eof());
        assert!(body.read(10).unwrap().is_empty());
    }

    #[test]
    fn test_write_overwrites_at_cursor() {
        let mut body = BufferedBody::with_content("abcdef");
        body.seek(SeekFrom::Start(2)).unwrap();
        body.write(b"XYZW__").unwrap();
        assert_eq!(body.to_string(), "abXYZW__");
        assert_eq!(body.tell(), 8);
    }

    #[test]
    fn test_seek_bounds() {
        let mut body = BufferedBody::with_content("abc");
        assert!(body.seek(SeekFrom::End(-1)).is_ok());
        assert_eq!(body.tell(), 2);
        assert!(body.seek(SeekFrom::Current(5)).is_err());
        assert!(body.seek(SeekFrom::End(-4)).is_err());
        assert_eq!(body.tell(), 2);
    }

    #[test]
    fn test_display_does_not_move_cursor() {
        let mut body = BufferedBody::with_content("payload");
        body.seek(SeekFrom::Start(3)).unwrap();
        assert_eq!(body.to_string(), "payload");
        assert_eq!(body.tell(), 3);
    }

    #[test]
    fn test_detach_leaves_body_unusable() {
        let mut body = BufferedBody::with_content("gone");
        assert_eq!(body.detach(), Some(Bytes::from_static(b"gone")));

        assert!(!body.is_readable());
        assert!(!body.is_writable());
        assert!(!body.is_seekable());
        assert!(body.eof());
        assert_eq!(body.size(), None);
        assert!(body.metadata(None).is_none());
        assert!(body.write(b"x").is_err());
        assert_eq!(body.detach(), None);
    }

    #[test]
    fn test_default_is_writable() {
        let mut body = BufferedBody::default();
        assert!(body.is_writable());
        assert_eq!(body.write(b"ok").unwrap(), 2);
    }

    #[test]
    fn test_metadata_lookup() {
        let body = BufferedBody::new();
        assert_eq!(
            body.metadata(Some("seekable")),
            Some(serde_json::Value::Bool(true))
        );
        assert!(body.metadata(Some("uri")).is_none());
    }
}
