//! Delayed loading sources
//!
//! A [`DelayedLoad`] produces the content of a [`Variant`] the first time it
//! is needed. Loading happens at most once per successful attempt; a failed
//! attempt leaves the loader in place so a later access retries.

use super::parser::parse_object_body;
use super::Variant;
use crate::error::{PdfError, Result};
use std::cell::RefCell;
use std::io::{Read, Seek, SeekFrom};
use std::rc::Rc;
use tracing::trace;

pub trait DelayedLoad {
    fn load(&mut self) -> Result<Variant>;
}

impl<F> DelayedLoad for F
where
    F: FnMut() -> Result<Variant>,
{
    fn load(&mut self) -> Result<Variant> {
        self()
    }
}

/// Parses a buffered object body on first access.
#[derive(Debug, Clone)]
pub struct BytesLoader {
    bytes: Vec<u8>,
}

impl BytesLoader {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

impl DelayedLoad for BytesLoader {
    fn load(&mut self) -> Result<Variant> {
        parse_object_body(&self.bytes)
    }
}

/// Reads `length` bytes at `offset` of a shared source on first access.
pub struct SourceLoader<R> {
    source: Rc<RefCell<R>>,
    offset: u64,
    length: usize,
}

impl<R: Read + Seek> SourceLoader<R> {
    pub fn new(source: Rc<RefCell<R>>, offset: u64, length: usize) -> Self {
        Self {
            source,
            offset,
            length,
        }
    }
}

impl<R: Read + Seek> DelayedLoad for SourceLoader<R> {
    fn load(&mut self) -> Result<Variant> {
        let mut source = self.source.try_borrow_mut().map_err(|_| {
            PdfError::InternalLogic("backing source is already borrowed".to_string())
        })?;
        trace!("Loading {} bytes at offset {}", self.length, self.offset);
        source.seek(SeekFrom::Start(self.offset))?;

        let mut buffer = vec![0; self.length];
        source.read_exact(&mut buffer).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => PdfError::UnexpectedEof(format!(
                "{} bytes at offset {}",
                self.length, self.offset
            )),
            _ => PdfError::Io(e),
        })?;
        drop(source);
        parse_object_body(&buffer)
    }
}

impl<R> std::fmt::Debug for SourceLoader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceLoader")
            .field("offset", &self.offset)
            .field("length", &self.length)
            .finish()
    }
}
