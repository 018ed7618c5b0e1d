//! Whole-file PDF writer
//!
//! [`PdfWriter`] serializes every object of an [`ObjectStore`] behind a
//! `%PDF-x.y` header, followed by a classic cross-reference table and the
//! trailer. Large streams can bypass the store and go straight to the
//! device through [`PdfWriter::write_stream_object`].

use crate::device::{DeviceStream, OutputDevice, WriterId};
use crate::encrypt::Encrypt;
use crate::error::{PdfError, Result};
use crate::filters::{filter_entry, FilterType};
use crate::objects::{Dictionary, Name, ObjectStore, Reference, Variant, WriteMode};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Generation number of the head of the free list.
const FREE_LIST_HEAD_GENERATION: u16 = u16::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PdfVersion {
    V1_0,
    V1_1,
    V1_2,
    V1_3,
    V1_4,
    V1_5,
    V1_6,
    #[default]
    V1_7,
    V2_0,
}

impl PdfVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            PdfVersion::V1_0 => "1.0",
            PdfVersion::V1_1 => "1.1",
            PdfVersion::V1_2 => "1.2",
            PdfVersion::V1_3 => "1.3",
            PdfVersion::V1_4 => "1.4",
            PdfVersion::V1_5 => "1.5",
            PdfVersion::V1_6 => "1.6",
            PdfVersion::V1_7 => "1.7",
            PdfVersion::V2_0 => "2.0",
        }
    }
}

impl fmt::Display for PdfVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for PDF writer
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Version written in the header
    pub version: PdfVersion,
    /// Serialization style of every object
    pub write_mode: WriteMode,
    /// Emit the `%âãÏÓ` comment marking the file as binary
    pub binary_marker: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            version: PdfVersion::default(),
            write_mode: WriteMode::DEFAULT,
            binary_marker: true,
        }
    }
}

impl WriterConfig {
    pub fn with_version(mut self, version: PdfVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    pub fn with_binary_marker(mut self, binary_marker: bool) -> Self {
        self.binary_marker = binary_marker;
        self
    }
}

pub struct PdfWriter<'a> {
    device: OutputDevice<'a>,
    config: WriterConfig,
    encrypt: Option<Box<dyn Encrypt + 'a>>,
    /// Byte offset and generation of every object written so far.
    offsets: BTreeMap<u32, (u16, usize)>,
    header_written: bool,
}

impl<'a> PdfWriter<'a> {
    pub fn new(device: OutputDevice<'a>) -> Self {
        Self::with_config(device, WriterConfig::default())
    }

    pub fn with_config(device: OutputDevice<'a>, config: WriterConfig) -> Self {
        Self {
            device,
            config,
            encrypt: None,
            offsets: BTreeMap::new(),
            header_written: false,
        }
    }

    /// Writes to a new file at `path`.
    pub fn create(path: impl AsRef<Path>, config: WriterConfig) -> Result<Self> {
        Ok(Self::with_config(OutputDevice::create(path)?, config))
    }

    /// Passes every string and stream body through `encrypt`, except those
    /// of the object the trailer's `/Encrypt` entry points to.
    pub fn with_encryption(mut self, encrypt: impl Encrypt + 'a) -> Self {
        self.encrypt = Some(Box::new(encrypt));
        self
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn device(&self) -> &OutputDevice<'a> {
        &self.device
    }

    pub fn into_device(self) -> OutputDevice<'a> {
        self.device
    }

    fn write_header(&mut self) -> Result<()> {
        if self.header_written {
            return Ok(());
        }
        self.device
            .print(format_args!("%PDF-{}\n", self.config.version))?;
        if self.config.binary_marker {
            self.device.write(&[b'%', 0xE2, 0xE3, 0xCF, 0xD3, b'\n'])?;
        }
        self.header_written = true;
        Ok(())
    }

    fn record_offset(&mut self, reference: Reference) {
        self.offsets
            .insert(reference.number(), (reference.generation(), self.device.tell()));
    }

    /// Writes the complete file: header, every object of `store` not yet
    /// written, the cross-reference table and `trailer` with `/Size` set.
    pub fn write_document(&mut self, store: &mut ObjectStore, trailer: &Dictionary) -> Result<()> {
        self.write_header()?;

        let encrypt_dictionary = trailer
            .get("Encrypt")
            .and_then(|entry| entry.get_reference().ok());
        let mode = self.config.write_mode;

        for object in store.iter_mut() {
            let reference = object.reference();
            if self.offsets.contains_key(&reference.number()) {
                continue;
            }
            let encrypt: Option<&dyn Encrypt> = match &self.encrypt {
                Some(_) if encrypt_dictionary == Some(reference) => None,
                Some(encrypt) => Some(&**encrypt),
                None => None,
            };
            self.offsets
                .insert(reference.number(), (reference.generation(), self.device.tell()));
            object.write_object(&mut self.device, mode, encrypt, None)?;
        }

        let size = self
            .offsets
            .keys()
            .next_back()
            .copied()
            .unwrap_or(0)
            .max(store.max_object_number())
            + 1;
        let free: BTreeMap<u32, u16> = store
            .free_objects()
            .map(|reference| (reference.number(), reference.generation()))
            .collect();

        let xref_offset = self.device.tell();
        self.write_xref(size, &free)?;

        let mut trailer = trailer.clone();
        trailer.set("Size", size as i64)?;
        self.device.write(b"trailer\n")?;
        trailer.write(&mut self.device, mode, None, None)?;
        self.device
            .print(format_args!("\nstartxref\n{xref_offset}\n%%EOF\n"))?;
        self.device.flush()?;

        info!(
            "Wrote {} objects, {} bytes",
            self.offsets.len(),
            self.device.length()
        );
        Ok(())
    }

    /// Classic cross-reference table. Numbers without an object are free;
    /// free entries link to the next free number and entry 0 heads the
    /// list.
    fn write_xref(&mut self, size: u32, free: &BTreeMap<u32, u16>) -> Result<()> {
        let free_numbers: Vec<u32> = (1..size)
            .filter(|number| !self.offsets.contains_key(number))
            .collect();
        let next_free = |number: u32| -> u32 {
            free_numbers
                .iter()
                .copied()
                .find(|free| *free > number)
                .unwrap_or(0)
        };

        self.device.print(format_args!("xref\n0 {size}\n"))?;
        self.device.print(format_args!(
            "{:010} {:05} f \n",
            next_free(0),
            FREE_LIST_HEAD_GENERATION
        ))?;
        for number in 1..size {
            match self.offsets.get(&number) {
                Some(&(generation, offset)) => self
                    .device
                    .print(format_args!("{offset:010} {generation:05} n \n"))?,
                None => {
                    let generation = free.get(&number).copied().unwrap_or(0);
                    self.device.print(format_args!(
                        "{:010} {:05} f \n",
                        next_free(number),
                        generation
                    ))?
                }
            }
        }
        debug!(
            "Cross-reference table: {} entries, {} free",
            size,
            free_numbers.len() + 1
        );
        Ok(())
    }

    /// Writes an indirect stream object straight to the device. `body`
    /// appends the decoded content, which is encoded through `filters` on
    /// the way out. The stream's `/Length` is an indirect object written
    /// right after it. Both objects are also kept in `store` so
    /// [`PdfWriter::write_document`] lists them in the cross-reference
    /// table.
    pub fn write_stream_object<F>(
        &mut self,
        store: &mut ObjectStore,
        mut dictionary: Dictionary,
        filters: &[FilterType],
        body: F,
    ) -> Result<Reference>
    where
        F: FnOnce(&mut DeviceStream<'_, 'a>) -> Result<()>,
    {
        if self.encrypt.is_some() {
            return Err(PdfError::NotImplemented(
                "direct stream writing with encryption".to_string(),
            ));
        }
        self.write_header()?;

        let reference = store.create_object(Variant::null())?;
        let length_reference = store.create_object(0)?;
        dictionary.set(Name::LENGTH, length_reference)?;
        match filter_entry(filters) {
            Some(filter) => dictionary.set(Name::FILTER, filter)?,
            None => {
                dictionary.remove(Name::FILTER)?;
            }
        }

        let mode = self.config.write_mode;
        self.record_offset(reference);
        self.device.print(format_args!(
            "{} {} obj\n",
            reference.number(),
            reference.generation()
        ))?;
        dictionary.write(&mut self.device, mode, None, None)?;
        self.device.write(b"\nstream\n")?;

        let mut stream = self
            .device
            .begin_stream(WriterId::from(reference), filters)?;
        body(&mut stream)?;
        let length = stream.finish()?;
        self.device.write(b"\nendstream\nendobj\n")?;

        let object = store
            .get_object_mut(reference)
            .ok_or_else(|| PdfError::InternalLogic(format!("stream object {reference} vanished")))?;
        object.variant_mut().replace(dictionary)?;

        let length_object = store.get_object_mut(length_reference).ok_or_else(|| {
            PdfError::InternalLogic(format!("length object {length_reference} vanished"))
        })?;
        length_object.variant_mut().replace(length as i64)?;
        self.offsets.insert(
            length_reference.number(),
            (length_reference.generation(), self.device.tell()),
        );
        length_object.write_object(&mut self.device, mode, None, None)?;

        debug!("Wrote stream object {} ({} bytes)", reference, length);
        Ok(reference)
    }
}

impl fmt::Debug for PdfWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfWriter")
            .field("device", &self.device)
            .field("config", &self.config)
            .field("encrypted", &self.encrypt.is_some())
            .field("objects", &self.offsets.len())
            .finish()
    }
}
