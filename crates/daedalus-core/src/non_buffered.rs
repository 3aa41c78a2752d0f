//! Non-buffered response body.

use crate::body::BodyStream;
use crate::error::DispatchResult;
use crate::output::OutputBuffers;
use bytes::{Bytes, BytesMut};
use std::fmt;
use std::io::SeekFrom;
use std::sync::Arc;

/// A write-only body that pushes every write to the client immediately.
///
/// Used for streaming and long-poll responses. Each [`write`](BodyStream::write)
/// first drains every open level of the ambient output buffers, so output
/// emitted earlier reaches the client ahead of the new bytes, then flushes.
/// The body cannot be read, sought or sized; those operations answer with
/// neutral values and never fail.
///
/// # Example
///
/// ```
/// use daedalus_core::{BodyStream, MemorySink, NonBufferedBody, OutputBufferStack};
/// use std::sync::Arc;
///
/// let sink = MemorySink::new();
/// let output = Arc::new(OutputBufferStack::new(sink.clone()));
/// output.start();
/// output.echo(b"pre").unwrap();
///
/// let mut body = NonBufferedBody::new(output.clone());
/// assert_eq!(body.write(b"abc").unwrap(), 6);
/// assert_eq!(sink.contents(), "preabc");
/// assert_eq!(output.level(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct NonBufferedBody {
    output: Arc<dyn OutputBuffers>,
}

impl NonBufferedBody {
    /// Creates a body writing through `output`.
    pub fn new(output: Arc<dyn OutputBuffers>) -> Self {
        Self { output }
    }

    fn drain_buffers(&self) -> BytesMut {
        let mut drained = Vec::new();
        while self.output.has_active_buffers() {
            drained.push(self.output.drain_innermost());
        }

        let mut buffered = BytesMut::with_capacity(drained.iter().map(Bytes::len).sum());
        for chunk in drained.iter().rev() {
            buffered.extend_from_slice(chunk);
        }
        buffered
    }
}

impl fmt::Display for NonBufferedBody {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ok(())
    }
}

impl BodyStream for NonBufferedBody {
    fn is_readable(&self) -> bool {
        false
    }

    fn read(&mut self, _len: usize) -> DispatchResult<Bytes> {
        Ok(Bytes::new())
    }

    fn contents(&mut self) -> DispatchResult<Bytes> {
        Ok(Bytes::new())
    }

    fn is_writable(&self) -> bool {
        true
    }

    fn write(&mut self, data: &[u8]) -> DispatchResult<usize> {
        let mut payload = self.drain_buffers();
        let drained = payload.len();
        payload.extend_from_slice(data);

        self.output.write_through(&payload)?;
        self.output.flush()?;

        tracing::trace!(drained, written = data.len(), "pushed body bytes to client");
        Ok(payload.len())
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn seek(&mut self, _pos: SeekFrom) -> DispatchResult<()> {
        Ok(())
    }

    fn rewind(&mut self) -> DispatchResult<()> {
        Ok(())
    }

    fn eof(&self) -> bool {
        true
    }

    fn size(&self) -> Option<u64> {
        None
    }

    fn tell(&self) -> u64 {
        0
    }

    fn metadata(&self, _key: Option<&str>) -> Option<serde_json::Value> {
        None
    }

    fn close(&mut self) {}

    fn detach(&mut self) -> Option<Bytes> {
        None
    }

    fn to_bytes(&self) -> Bytes {
        Bytes::new()
    }
}
