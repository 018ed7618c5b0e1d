use crate::device::{OutputDevice, WriterId};
use crate::encrypt::EncryptContext;
use crate::error::{PdfError, Result};
use crate::filters::{FilterChain, FilterType};
use tracing::trace;

/// Encoded body of a stream object.
///
/// The bytes are kept encoded with [`Stream::filters`]; the owning object
/// dictionary receives matching `/Length` and `/Filter` entries when it is
/// written.
#[derive(Debug, Default)]
pub struct Stream {
    data: Vec<u8>,
    filters: Vec<FilterType>,
    append: Option<FilterChain>,
    dirty: bool,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the body with `data` encoded through `filters`.
    pub fn set(&mut self, data: &[u8], filters: &[FilterType]) -> Result<()> {
        self.begin_append(filters, true)?;
        self.append(data)?;
        self.end_append()
    }

    /// Replaces the body with bytes already encoded through `filters`.
    pub fn set_raw(&mut self, encoded: Vec<u8>, filters: Vec<FilterType>) -> Result<()> {
        self.check_not_appending()?;
        self.data = encoded;
        self.filters = filters;
        self.dirty = true;
        Ok(())
    }

    /// Starts an append session. Unless `clear_existing` is set, the current
    /// body is decoded and re-encoded with the new filters first.
    pub fn begin_append(&mut self, filters: &[FilterType], clear_existing: bool) -> Result<()> {
        self.check_not_appending()?;
        let existing = if clear_existing || self.data.is_empty() {
            Vec::new()
        } else {
            self.filtered_copy()?
        };

        let mut chain = FilterChain::new(filters)?;
        self.data = chain.encode_chunk(&existing)?;
        self.filters = filters.to_vec();
        self.append = Some(chain);
        self.dirty = true;
        Ok(())
    }

    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        let chain = self.append.as_mut().ok_or_else(|| {
            PdfError::InternalLogic("stream append without begin_append".to_string())
        })?;
        let encoded = chain.encode_chunk(data)?;
        self.data.extend_from_slice(&encoded);
        Ok(())
    }

    pub fn end_append(&mut self) -> Result<()> {
        let mut chain = self.append.take().ok_or_else(|| {
            PdfError::InternalLogic("stream end_append without begin_append".to_string())
        })?;
        let tail = chain.finish()?;
        self.data.extend_from_slice(&tail);
        trace!("Stream body now {} encoded bytes", self.data.len());
        Ok(())
    }

    pub fn is_appending(&self) -> bool {
        self.append.is_some()
    }

    fn check_not_appending(&self) -> Result<()> {
        if self.is_appending() {
            return Err(PdfError::InternalLogic(
                "stream is in the middle of an append session".to_string(),
            ));
        }
        Ok(())
    }

    /// Encoded bytes.
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }

    pub fn filters(&self) -> &[FilterType] {
        &self.filters
    }

    /// Encoded length.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Decoded copy of the body.
    pub fn filtered_copy(&self) -> Result<Vec<u8>> {
        self.check_not_appending()?;
        FilterChain::decode(&self.filters, &self.data)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Writes `stream`, the body and `endstream`, holding the device for
    /// `writer` while the body goes out.
    pub fn write(
        &self,
        device: &mut OutputDevice<'_>,
        writer: WriterId,
        encrypt: Option<EncryptContext<'_>>,
    ) -> Result<()> {
        self.check_not_appending()?;
        device.write(b"stream\n")?;
        {
            let mut body = device.begin_stream(writer, &[])?;
            match encrypt {
                Some(context) => body.append(&context.encrypt(&self.data)?)?,
                None => body.append(&self.data)?,
            }
            body.finish()?;
        }
        device.write(b"\nendstream\n")
    }
}
