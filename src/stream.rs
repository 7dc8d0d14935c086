//! Translated stream wrapper (component E).
//!
//! Wraps an underlying byte stream with two independent [`TranslationState`]
//! instances — one per direction — so that reads and writes through the
//! wrapper are transparently EOL/keyword translated.

use std::io::{Read, Write};

use crate::error::{Result, SubstError};
use crate::subst::TranslationState;

/// I/O granularity used when pulling raw bytes from the underlying stream
/// on read (§3 Limits: "`CHUNK` is an implementation-chosen I/O
/// granularity").
const CHUNK: usize = 16 * 1024;

/// Wraps `S` with read-side and write-side translation. The two
/// directions share no state (§4.5).
pub struct TranslatedStream<S> {
    inner: Option<S>,
    read_state: TranslationState,
    write_state: TranslationState,
    read_buf: Vec<u8>,
    read_pos: usize,
    read_eof: bool,
    written: bool,
    closed: bool,
}

impl<S: Read + Write> TranslatedStream<S> {
    pub fn new(inner: S, read_state: TranslationState, write_state: TranslationState) -> Self {
        Self {
            inner: Some(inner),
            read_state,
            write_state,
            read_buf: Vec::new(),
            read_pos: 0,
            read_eof: false,
            written: false,
            closed: false,
        }
    }

    fn inner_mut(&mut self) -> Result<&mut S> {
        self.inner.as_mut().ok_or(SubstError::ClosedStream)
    }

    /// Read up to `out.len()` translated bytes (§4.5 "Read").
    pub fn read_translated(&mut self, out: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Err(SubstError::ClosedStream);
        }
        loop {
            if self.read_pos < self.read_buf.len() {
                let n = out.len().min(self.read_buf.len() - self.read_pos);
                out[..n].copy_from_slice(&self.read_buf[self.read_pos..self.read_pos + n]);
                self.read_pos += n;
                if self.read_pos == self.read_buf.len() {
                    self.read_buf.clear();
                    self.read_pos = 0;
                }
                return Ok(n);
            }
            if self.read_eof {
                return Ok(0);
            }
            let mut raw = vec![0u8; CHUNK];
            let n = self
                .inner_mut()?
                .read(&mut raw)
                .map_err(|e| SubstError::io("read", "<stream>", e))?;
            if n == 0 {
                self.read_eof = true;
                self.read_state.transduce(None, &mut self.read_buf)?;
            } else {
                self.read_state.transduce(Some(&raw[..n]), &mut self.read_buf)?;
            }
        }
    }

    /// Push raw bytes through the write-side transducer (§4.5 "Write").
    pub fn write_translated(&mut self, buf: &[u8]) -> Result<usize> {
        if self.closed {
            return Err(SubstError::ClosedStream);
        }
        self.written = true;
        let write_state = &mut self.write_state;
        let inner = self.inner.as_mut().ok_or(SubstError::ClosedStream)?;
        write_state.transduce(Some(buf), inner)?;
        Ok(buf.len())
    }

    /// Flush the write side if anything was written, then drop the
    /// underlying stream. Idempotent: a second call fails with
    /// [`SubstError::ClosedStream`] (§4.5 "Close").
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(SubstError::ClosedStream);
        }
        self.closed = true;
        if self.written {
            if let Some(inner) = self.inner.as_mut() {
                self.write_state.transduce(None, inner)?;
            }
        }
        self.inner = None;
        Ok(())
    }
}

impl<S: Read + Write> Read for TranslatedStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.read_translated(buf).map_err(Into::into)
    }
}

impl<S: Read + Write> Write for TranslatedStream<S> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.write_translated(buf).map_err(Into::into)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if self.closed {
            return Err(SubstError::ClosedStream.into());
        }
        self.inner_mut()?.flush()
    }
}
