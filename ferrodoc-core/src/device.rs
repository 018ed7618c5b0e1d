//! Output devices
//!
//! An [`OutputDevice`] is an ordered byte sink that keeps a running length
//! regardless of where the bytes go. Devices can optionally check write
//! order through a stack of writer identities: while a writer (typically a
//! stream being appended over several calls) holds the device, writes from
//! any other identity fail with [`PdfError::InternalLogic`].

use crate::error::{PdfError, Result};
use crate::filters::{FilterChain, FilterType};
use crate::objects::Reference;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{trace, warn};

/// Identity of a logical writer on the writer stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WriterId(u64);

impl WriterId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl From<Reference> for WriterId {
    fn from(reference: Reference) -> Self {
        Self(((reference.number() as u64) << 16) | reference.generation() as u64)
    }
}

enum Sink<'a> {
    /// Counts bytes, stores nothing.
    Counting,
    File(BufWriter<File>),
    /// Caller-provided buffer that never grows.
    Fixed(&'a mut [u8]),
    Memory(Vec<u8>),
    Stream(Box<dyn Write + 'a>),
}

pub struct OutputDevice<'a> {
    sink: Sink<'a>,
    position: usize,
    length: usize,
    writers: Option<Vec<WriterId>>,
}

impl<'a> OutputDevice<'a> {
    fn with_sink(sink: Sink<'a>) -> Self {
        Self {
            sink,
            position: 0,
            length: 0,
            writers: None,
        }
    }

    /// A device that only measures what would be written.
    pub fn counting() -> Self {
        Self::with_sink(Sink::Counting)
    }

    /// A growable in-memory buffer.
    pub fn memory() -> Self {
        Self::with_sink(Sink::Memory(Vec::new()))
    }

    /// A fixed buffer; writing past its end fails with `OutOfMemory`.
    pub fn fixed(buffer: &'a mut [u8]) -> Self {
        Self::with_sink(Sink::Fixed(buffer))
    }

    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => PdfError::FileNotFound(path.display().to_string()),
            _ => PdfError::Io(e),
        })?;
        Ok(Self::with_sink(Sink::File(BufWriter::new(file))))
    }

    /// Any `Write` implementation; seeking is not supported.
    pub fn from_writer(writer: impl Write + 'a) -> Self {
        Self::with_sink(Sink::Stream(Box::new(writer)))
    }

    /// Enables writer-stack checking for every write, print and seek.
    pub fn with_ordered_writes(mut self) -> Self {
        self.writers = Some(Vec::new());
        self
    }

    pub fn checks_write_order(&self) -> bool {
        self.writers.is_some()
    }

    /// Bytes written so far (the high-water mark of the position).
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn tell(&self) -> usize {
        self.position
    }

    /// Written bytes of a memory or fixed device.
    pub fn buffer(&self) -> Option<&[u8]> {
        match &self.sink {
            Sink::Memory(buffer) => Some(buffer),
            Sink::Fixed(buffer) => Some(&buffer[..self.length]),
            _ => None,
        }
    }

    /// Consumes a memory device and returns its bytes.
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self.sink {
            Sink::Memory(buffer) => Some(buffer),
            Sink::Fixed(buffer) => Some(buffer[..self.length].to_vec()),
            _ => None,
        }
    }

    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.write_as(None, data)
    }

    pub fn print(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        self.print_as(None, args)
    }

    pub fn seek(&mut self, offset: usize) -> Result<()> {
        self.seek_as(None, offset)
    }

    /// Writes on behalf of `writer`; `None` is the anonymous writer, allowed
    /// only while the writer stack is empty.
    pub fn write_as(&mut self, writer: Option<WriterId>, data: &[u8]) -> Result<()> {
        self.check_writer(writer)?;

        let end = self.position + data.len();
        match &mut self.sink {
            Sink::Counting => {}
            Sink::File(file) => file.write_all(data)?,
            Sink::Fixed(buffer) => {
                if end > buffer.len() {
                    return Err(PdfError::OutOfMemory(format!(
                        "write of {} bytes at {} exceeds fixed buffer of {} bytes",
                        data.len(),
                        self.position,
                        buffer.len()
                    )));
                }
                buffer[self.position..end].copy_from_slice(data);
            }
            Sink::Memory(buffer) => {
                let overlap = buffer.len().min(end) - self.position.min(buffer.len());
                buffer[self.position..self.position + overlap].copy_from_slice(&data[..overlap]);
                buffer.extend_from_slice(&data[overlap..]);
            }
            Sink::Stream(stream) => stream.write_all(data)?,
        }

        self.position = end;
        self.length = self.length.max(end);
        Ok(())
    }

    pub fn print_as(&mut self, writer: Option<WriterId>, args: fmt::Arguments<'_>) -> Result<()> {
        let text = args.to_string();
        self.write_as(writer, text.as_bytes())
    }

    pub fn seek_as(&mut self, writer: Option<WriterId>, offset: usize) -> Result<()> {
        self.check_writer(writer)?;

        if offset > self.length {
            return Err(PdfError::ValueOutOfRange(format!(
                "seek to {offset} beyond device length {}",
                self.length
            )));
        }

        match &mut self.sink {
            Sink::Counting | Sink::Memory(_) => {}
            Sink::Fixed(buffer) => {
                if offset > buffer.len() {
                    return Err(PdfError::OutOfMemory(format!(
                        "seek to {offset} beyond fixed buffer of {} bytes",
                        buffer.len()
                    )));
                }
            }
            Sink::File(file) => {
                file.seek(SeekFrom::Start(offset as u64))?;
            }
            Sink::Stream(_) => {
                return Err(PdfError::NotImplemented(
                    "seek on a stream device".to_string(),
                ))
            }
        }

        self.position = offset;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        match &mut self.sink {
            Sink::File(file) => file.flush()?,
            Sink::Stream(stream) => stream.flush()?,
            _ => {}
        }
        Ok(())
    }

    /// Top of the writer stack, if checking is enabled and a writer holds the
    /// device.
    pub fn current_writer(&self) -> Option<WriterId> {
        self.writers.as_ref().and_then(|stack| stack.last().copied())
    }

    /// Pushes `next` after verifying that `expected_last` is the current top
    /// (`None` meaning an empty stack). No-op when checking is disabled.
    pub fn push_writer(&mut self, expected_last: Option<WriterId>, next: WriterId) -> Result<()> {
        let Some(stack) = self.writers.as_mut() else {
            return Ok(());
        };

        let top = stack.last().copied();
        if top != expected_last {
            return Err(PdfError::InternalLogic(format!(
                "push of writer {next:?}: expected top {expected_last:?}, found {top:?}"
            )));
        }

        trace!("Device writer push {:?}", next);
        stack.push(next);
        Ok(())
    }

    /// Pops `expected_last`, which must be the current top.
    pub fn pop_writer(&mut self, expected_last: WriterId) -> Result<()> {
        let Some(stack) = self.writers.as_mut() else {
            return Ok(());
        };

        match stack.last() {
            Some(top) if *top == expected_last => {
                trace!("Device writer pop {:?}", expected_last);
                stack.pop();
                Ok(())
            }
            top => Err(PdfError::InternalLogic(format!(
                "pop of writer {expected_last:?}: current top is {top:?}"
            ))),
        }
    }

    fn check_writer(&self, writer: Option<WriterId>) -> Result<()> {
        let Some(stack) = self.writers.as_ref() else {
            return Ok(());
        };

        let top = stack.last().copied();
        if top != writer {
            return Err(PdfError::InternalLogic(format!(
                "write from {writer:?} while device is held by {top:?}"
            )));
        }
        Ok(())
    }

    /// Holds the device for `writer` and returns a guard that encodes
    /// appended chunks through `filters` straight onto the device.
    pub fn begin_stream(
        &mut self,
        writer: WriterId,
        filters: &[FilterType],
    ) -> Result<DeviceStream<'_, 'a>> {
        let chain = FilterChain::new(filters)?;
        let expected = self.current_writer();
        self.push_writer(expected, writer)?;
        Ok(DeviceStream {
            device: self,
            writer,
            chain,
            written: 0,
            finished: false,
        })
    }
}

impl fmt::Debug for OutputDevice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.sink {
            Sink::Counting => "counting",
            Sink::File(_) => "file",
            Sink::Fixed(_) => "fixed",
            Sink::Memory(_) => "memory",
            Sink::Stream(_) => "stream",
        };
        f.debug_struct("OutputDevice")
            .field("sink", &kind)
            .field("position", &self.position)
            .field("length", &self.length)
            .field("writers", &self.writers)
            .finish()
    }
}

/// A stream body being appended to a device across several calls.
pub struct DeviceStream<'d, 'a> {
    device: &'d mut OutputDevice<'a>,
    writer: WriterId,
    chain: FilterChain,
    written: usize,
    finished: bool,
}

impl DeviceStream<'_, '_> {
    pub fn writer(&self) -> WriterId {
        self.writer
    }

    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        let encoded = self.chain.encode_chunk(data)?;
        self.device.write_as(Some(self.writer), &encoded)?;
        self.written += encoded.len();
        Ok(())
    }

    /// Flushes the filters, releases the device and returns the number of
    /// encoded bytes written.
    pub fn finish(mut self) -> Result<usize> {
        let tail = self.chain.finish()?;
        self.device.write_as(Some(self.writer), &tail)?;
        self.written += tail.len();
        self.finished = true;
        self.device.pop_writer(self.writer)?;
        Ok(self.written)
    }
}

impl Drop for DeviceStream<'_, '_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Stream writer {:?} dropped without finish", self.writer);
            if let Err(e) = self.device.pop_writer(self.writer) {
                warn!("Could not release device: {}", e);
            }
        }
    }
}
