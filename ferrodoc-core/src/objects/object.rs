use super::{Container, Dictionary, Name, ObjectStore, Reference, Stream, StoreId, Variant, VariantData, WriteMode};
use crate::device::{OutputDevice, WriterId};
use crate::encrypt::{Encrypt, EncryptContext};
use crate::error::{PdfError, Result};
use crate::filters::filter_entry;

/// A variant with an identity: a [`Reference`], an optional stream and the
/// store that owns it.
#[derive(Debug)]
pub struct Object {
    reference: Reference,
    variant: Variant,
    stream: Option<Stream>,
    owner: Option<StoreId>,
}

impl Object {
    pub fn new(reference: Reference, variant: impl Into<Variant>) -> Self {
        Self {
            reference,
            variant: variant.into(),
            stream: None,
            owner: None,
        }
    }

    /// An object with the `0 0` reference; written without `obj`/`endobj`.
    pub fn direct(variant: impl Into<Variant>) -> Self {
        Self::new(Reference::direct(), variant)
    }

    pub fn reference(&self) -> Reference {
        self.reference
    }

    pub(crate) fn set_reference(&mut self, reference: Reference) {
        self.reference = reference;
    }

    pub fn owner(&self) -> Option<StoreId> {
        self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: Option<StoreId>) {
        self.owner = owner;
    }

    pub fn variant(&self) -> &Variant {
        &self.variant
    }

    pub fn variant_mut(&mut self) -> &mut Variant {
        &mut self.variant
    }

    pub fn into_variant(self) -> Variant {
        self.variant
    }

    pub fn dictionary(&self) -> Result<&Dictionary> {
        self.variant.get_dictionary()
    }

    pub fn dictionary_mut(&mut self) -> Result<&mut Dictionary> {
        self.variant.get_dictionary_mut()
    }

    /// Looks `key` up in this object's dictionary. A reference value is
    /// resolved through `store`, which must be the store owning this object.
    ///
    /// Returns `Ok(None)` when the key is missing or the reference dangles.
    pub fn get_indirect_key<'a>(
        &'a self,
        key: &str,
        store: &'a ObjectStore,
    ) -> Result<Option<&'a Variant>> {
        let Some(value) = self.dictionary()?.get(key) else {
            return Ok(None);
        };
        if !value.is_reference() {
            return Ok(Some(value));
        }
        match self.owner {
            Some(owner) if owner == store.id() => Ok(store.resolve(value)),
            Some(_) => Err(PdfError::InvalidHandle(format!(
                "object {} belongs to another store",
                self.reference
            ))),
            None => Err(PdfError::InvalidHandle(format!(
                "object {} has no owning store to resolve /{key}",
                self.reference
            ))),
        }
    }

    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    pub fn stream(&self) -> Option<&Stream> {
        self.stream.as_ref()
    }

    /// The attached stream, created empty on first access. Only objects
    /// owned by a store can carry a stream.
    pub fn get_stream(&mut self) -> Result<&mut Stream> {
        self.variant.load()?;
        if self.stream.is_none() && self.owner.is_none() {
            return Err(PdfError::InvalidHandle(format!(
                "object {} must belong to a store to carry a stream",
                self.reference
            )));
        }
        Ok(self.stream.get_or_insert_with(Stream::new))
    }

    pub(crate) fn attach_stream(&mut self, stream: Stream) {
        self.stream = Some(stream);
    }

    pub fn is_dirty(&self) -> bool {
        self.variant.is_dirty() || self.stream.as_ref().is_some_and(Stream::is_dirty)
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.variant.set_dirty(dirty);
        if let Some(stream) = &mut self.stream {
            stream.set_dirty(dirty);
        }
    }

    /// Brings `/Length` and `/Filter` in line with the attached stream.
    fn sync_stream_keys(&mut self, encrypt: Option<&dyn Encrypt>) -> Result<()> {
        let Some(stream) = &self.stream else {
            return Ok(());
        };
        let length = match encrypt {
            Some(encrypt) => encrypt.calculate_stream_length(stream.len()),
            None => stream.len(),
        };
        let filter = filter_entry(stream.filters());

        let dict = match self.variant.data_mut_unchecked()? {
            VariantData::Dictionary(dict) => dict,
            other => {
                return Err(PdfError::invalid_type(
                    "Dictionary for a stream object",
                    other.data_type(),
                ))
            }
        };
        dict.sync_entry(Name::LENGTH, Variant::from(length as i64));
        match filter {
            Some(filter) => dict.sync_entry(Name::FILTER, filter),
            None => dict.remove_unchecked(Name::FILTER),
        }
        Ok(())
    }

    /// Serializes the object. Indirect objects are framed by `N G obj` and
    /// `endobj`; an attached stream follows the body. `key_stop` ends a
    /// dictionary body early, see [`Dictionary::write`].
    pub fn write_object(
        &mut self,
        device: &mut OutputDevice<'_>,
        mode: WriteMode,
        encrypt: Option<&dyn Encrypt>,
        key_stop: Option<&str>,
    ) -> Result<()> {
        self.sync_stream_keys(encrypt)?;

        let indirect = self.reference.is_indirect();
        if indirect {
            device.print(format_args!(
                "{} {} obj\n",
                self.reference.number(),
                self.reference.generation()
            ))?;
        }

        let context = encrypt.map(|encrypt| EncryptContext::new(encrypt, self.reference));
        self.variant.write_until(device, mode, context, key_stop)?;
        device.write(b"\n")?;

        if let Some(stream) = &self.stream {
            stream.write(device, WriterId::from(self.reference), context)?;
        }
        if indirect {
            device.write(b"endobj\n")?;
        }
        Ok(())
    }

    /// Number of bytes [`Object::write_object`] produces.
    pub fn object_length(&mut self, mode: WriteMode) -> Result<usize> {
        let mut device = OutputDevice::counting();
        self.write_object(&mut device, mode, None, None)?;
        Ok(device.length())
    }
}
