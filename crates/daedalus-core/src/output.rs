//! Ambient output buffering.
//!
//! Output that a handler emits outside of its response (diagnostics, legacy
//! template engines, progress output) lands in an [`OutputBufferStack`]: a
//! stack of nested buffer levels in front of the real output sink. A route
//! opens a level around its handler to capture that output; a
//! [`NonBufferedBody`](crate::NonBufferedBody) drains every level before it
//! writes, so nothing emitted earlier is overtaken by streamed bytes.
//!
//! # Example
//!
//! ```
//! use daedalus_core::output::{MemorySink, OutputBufferStack};
//!
//! let sink = MemorySink::new();
//! let stack = OutputBufferStack::new(sink.clone());
//!
//! stack.start();
//! stack.echo(b"captured").unwrap();
//! assert!(sink.contents().is_empty());
//!
//! assert_eq!(stack.end().unwrap(), "captured");
//! stack.echo(b"direct").unwrap();
//! assert_eq!(sink.contents(), "direct");
//! ```

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// The operations a non-buffered body needs from the ambient buffer stack.
pub trait OutputBuffers: Send + Sync + fmt::Debug {
    /// Returns whether at least one buffer level is open.
    fn has_active_buffers(&self) -> bool;

    /// Closes the innermost buffer level and returns what it held.
    ///
    /// Returns empty bytes when no level is open.
    fn drain_innermost(&self) -> Bytes;

    /// Writes straight to the output sink, bypassing every buffer level.
    fn write_through(&self, data: &[u8]) -> io::Result<()>;

    /// Flushes the output sink to the client.
    fn flush(&self) -> io::Result<()>;
}

/// Identifies a level opened with [`OutputBufferStack::start_owned`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LevelToken(u64);

#[derive(Debug, Default)]
struct Level {
    owner: Option<LevelToken>,
    buf: BytesMut,
}

/// A stack of nested output buffers in front of an output sink.
///
/// Output always goes to the innermost level, so a stack only keeps the
/// output of concurrent dispatches apart when each of them has its own.
pub struct OutputBufferStack {
    /// Open levels, innermost last.
    levels: Mutex<Vec<Level>>,
    sink: Mutex<Box<dyn Write + Send>>,
    next_token: AtomicU64,
}

impl OutputBufferStack {
    /// Creates a stack with no open level in front of `sink`.
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self {
            levels: Mutex::new(Vec::new()),
            sink: Mutex::new(Box::new(sink)),
            next_token: AtomicU64::new(1),
        }
    }

    /// Opens a new innermost level and returns the resulting depth.
    pub fn start(&self) -> usize {
        let mut levels = self.levels.lock();
        levels.push(Level::default());
        levels.len()
    }

    /// Closes the innermost level and returns its content.
    pub fn end(&self) -> Option<Bytes> {
        self.levels.lock().pop().map(|level| level.buf.freeze())
    }

    /// Opens a new innermost level owned by the returned token.
    pub fn start_owned(&self) -> LevelToken {
        let token = LevelToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.levels.lock().push(Level {
            owner: Some(token),
            buf: BytesMut::new(),
        });
        token
    }

    /// Closes the level owned by `token` and returns its content.
    ///
    /// Anonymous levels opened on top of it are folded into it; levels owned
    /// by another token stay open. Returns `None` when the level is gone,
    /// e.g. drained by a non-buffered body.
    pub fn end_owned(&self, token: LevelToken) -> Option<Bytes> {
        let mut levels = self.levels.lock();
        let index = levels
            .iter()
            .position(|level| level.owner == Some(token))?;
        let nested = levels[index + 1..]
            .iter()
            .take_while(|level| level.owner.is_none())
            .count();

        let mut removed = levels.drain(index..=index + nested);
        let mut content = removed.next().map(|level| level.buf).unwrap_or_default();
        for level in removed {
            content.extend_from_slice(&level.buf);
        }
        Some(content.freeze())
    }

    /// Folds every level deeper than `depth` into the level at `depth`.
    ///
    /// Levels keep their order: the content of deeper levels is appended to
    /// the shallower one.
    pub fn collapse_to(&self, depth: usize) {
        let mut levels = self.levels.lock();
        if depth == 0 || levels.len() <= depth {
            return;
        }
        let deeper = levels.split_off(depth);
        if let Some(target) = levels.last_mut() {
            for level in deeper {
                target.buf.extend_from_slice(&level.buf);
            }
        }
    }

    /// Returns the number of open levels.
    pub fn level(&self) -> usize {
        self.levels.lock().len()
    }

    /// Emits output: into the innermost level, or to the sink when none is open.
    pub fn echo(&self, data: &[u8]) -> io::Result<()> {
        {
            let mut levels = self.levels.lock();
            if let Some(innermost) = levels.last_mut() {
                innermost.buf.extend_from_slice(data);
                return Ok(());
            }
        }
        self.sink.lock().write_all(data)
    }
}

impl fmt::Debug for OutputBufferStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputBufferStack")
            .field("level", &self.level())
            .finish_non_exhaustive()
    }
}

impl OutputBuffers for OutputBufferStack {
    fn has_active_buffers(&self) -> bool {
        self.level() > 0
    }

    fn drain_innermost(&self) -> Bytes {
        self.end().unwrap_or_default()
    }

    fn write_through(&self, data: &[u8]) -> io::Result<()> {
        self.sink.lock().write_all(data)
    }

    fn flush(&self) -> io::Result<()> {
        self.sink.lock().flush()
    }
}

/// An in-memory output sink that can be inspected after writing.
///
/// Clones share the same storage, so one clone can be handed to an
/// [`OutputBufferStack`] and another kept to look at what reached the client.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    data: Arc<Mutex<Vec<u8>>>,
    flushes: Arc<AtomicUsize>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything written so far.
    #[must_use]
    pub fn contents(&self) -> Bytes {
        Bytes::copy_from_slice(&self.data.lock())
    }

    /// Returns how many times the sink was flushed.
    #[must_use]
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_without_levels_goes_to_sink() {
        let sink = MemorySink::new();
        let stack = OutputBufferStack::new(sink.clone());

        stack.echo(b"hello").unwrap();
        assert_eq!(sink.contents(), "hello");
        assert!(!stack.has_active_buffers());
    }

    #[test]
    fn test_levels_nest() {
        let sink = MemorySink::new();
        let stack = OutputBufferStack::new(sink.clone());

        assert_eq!(stack.start(), 1);
        stack.echo(b"outer").unwrap();
        assert_eq!(stack.start(), 2);
        stack.echo(b"inner").unwrap();

        assert_eq!(stack.drain_innermost(), "inner");
        assert_eq!(stack.drain_innermost(), "outer");
        assert!(stack.drain_innermost().is_empty());
        assert!(sink.contents().is_empty());
    }

    #[test]
    fn test_collapse_to_merges_deeper_levels() {
        let stack = OutputBufferStack::new(MemorySink::new());
        stack.start();
        stack.echo(b"a").unwrap();
        stack.start();
        stack.echo(b"b").unwrap();
        stack.start();
        stack.echo(b"c").unwrap();

        stack.collapse_to(1);
        assert_eq!(stack.level(), 1);
        assert_eq!(stack.end().unwrap(), "abc");
    }

    #[test]
    fn test_collapse_to_ignores_shallow_stack() {
        let stack = OutputBufferStack::new(MemorySink::new());
        stack.start();
        stack.collapse_to(3);
        assert_eq!(stack.level(), 1);
        stack.collapse_to(0);
        assert_eq!(stack.level(), 1);
    }

    #[test]
    fn test_owned_level_leaves_other_owners_open() {
        let stack = OutputBufferStack::new(MemorySink::new());
        let first = stack.start_owned();
        stack.echo(b"first").unwrap();
        let second = stack.start_owned();
        stack.echo(b"second").unwrap();

        assert_eq!(stack.end_owned(first).unwrap(), "first");
        assert_eq!(stack.level(), 1);
        assert_eq!(stack.end_owned(second).unwrap(), "second");
        assert_eq!(stack.level(), 0);
        assert!(stack.end_owned(first).is_none());
    }

    #[test]
    fn test_owned_level_folds_anonymous_levels() {
        let stack = OutputBufferStack::new(MemorySink::new());
        stack.start();
        stack.echo(b"outer").unwrap();
        let token = stack.start_owned();
        stack.echo(b"a").unwrap();
        stack.start();
        stack.echo(b"b").unwrap();

        assert_eq!(stack.end_owned(token).unwrap(), "ab");
        assert_eq!(stack.level(), 1);
        assert_eq!(stack.end().unwrap(), "outer");
    }

    #[test]
    fn test_drained_owned_level_is_gone() {
        let stack = OutputBufferStack::new(MemorySink::new());
        let token = stack.start_owned();
        stack.echo(b"x").unwrap();

        assert_eq!(stack.drain_innermost(), "x");
        assert!(stack.end_owned(token).is_none());
    }

    #[test]
    fn test_write_through_and_flush() {
        let sink = MemorySink::new();
        let stack = OutputBufferStack::new(sink.clone());
        stack.start();

        stack.write_through(b"bypass").unwrap();
        stack.flush().unwrap();

        assert_eq!(sink.contents(), "bypass");
        assert_eq!(sink.flush_count(), 1);
        assert_eq!(stack.level(), 1);
    }
}
