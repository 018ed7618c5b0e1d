//! Tagged PDF values with optional delayed loading
//!
//! A [`Variant`] either owns its [`VariantData`] or holds a [`DelayedLoad`]
//! that produces it on first access. Every accessor, every mutator, copying
//! and serialization trigger the load, so callers never observe an
//! unloaded value.

use super::{Array, Container, Dictionary, DelayedLoad, Name, PdfString, Reference};
use crate::device::OutputDevice;
use crate::encrypt::EncryptContext;
use crate::error::{PdfError, Result};
use bitflags::bitflags;
use std::borrow::Cow;
use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use tracing::warn;

bitflags! {
    /// Serialization mode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WriteMode: u8 {
        /// Minimal whitespace.
        const COMPACT = 0x01;
        /// Human readable: spaces around values, one dictionary entry per line.
        const CLEAN = 0x02;
    }
}

impl WriteMode {
    pub const DEFAULT: WriteMode = WriteMode::COMPACT;

    /// Check for compact output
    pub fn is_compact(&self) -> bool {
        self.contains(WriteMode::COMPACT)
    }

    /// Check for clean output
    pub fn is_clean(&self) -> bool {
        self.contains(WriteMode::CLEAN)
    }
}

impl Default for WriteMode {
    fn default() -> Self {
        WriteMode::DEFAULT
    }
}

/// Payload-free discriminant of a [`Variant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Null,
    Bool,
    Number,
    Real,
    String,
    HexString,
    Name,
    Reference,
    Array,
    Dictionary,
    RawData,
}

impl DataType {
    /// Type name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Null => "Null",
            DataType::Bool => "Bool",
            DataType::Number => "Number",
            DataType::Real => "Real",
            DataType::String => "String",
            DataType::HexString => "HexString",
            DataType::Name => "Name",
            DataType::Reference => "Reference",
            DataType::Array => "Array",
            DataType::Dictionary => "Dictionary",
            DataType::RawData => "RawData",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Loaded content of a [`Variant`].
#[derive(Debug, Clone)]
pub enum VariantData {
    Null,
    Bool(bool),
    Number(i64),
    Real(f64),
    String(PdfString),
    Name(Name),
    Reference(Reference),
    Array(Array),
    Dictionary(Dictionary),
    /// Pre-serialized bytes written verbatim.
    RawData(Vec<u8>),
}

impl VariantData {
    /// Type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            VariantData::Null => DataType::Null,
            VariantData::Bool(_) => DataType::Bool,
            VariantData::Number(_) => DataType::Number,
            VariantData::Real(_) => DataType::Real,
            VariantData::String(s) if s.is_hex() => DataType::HexString,
            VariantData::String(_) => DataType::String,
            VariantData::Name(_) => DataType::Name,
            VariantData::Reference(_) => DataType::Reference,
            VariantData::Array(_) => DataType::Array,
            VariantData::Dictionary(_) => DataType::Dictionary,
            VariantData::RawData(_) => DataType::RawData,
        }
    }

    fn as_container(&self) -> Option<&dyn Container> {
        match self {
            VariantData::Array(array) => Some(array),
            VariantData::Dictionary(dictionary) => Some(dictionary),
            _ => None,
        }
    }

    fn as_container_mut(&mut self) -> Option<&mut dyn Container> {
        match self {
            VariantData::Array(array) => Some(array),
            VariantData::Dictionary(dictionary) => Some(dictionary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    Loading,
    Loaded,
}

pub struct Variant {
    data: OnceCell<VariantData>,
    loader: RefCell<Option<Box<dyn DelayedLoad>>>,
    state: Cell<LoadState>,
    dirty: bool,
    immutable: bool,
}

impl Variant {
    /// Create a loaded variant
    pub fn new(data: VariantData) -> Self {
        Self {
            data: OnceCell::from(data),
            loader: RefCell::new(None),
            state: Cell::new(LoadState::Loaded),
            dirty: false,
            immutable: false,
        }
    }

    /// Create a null variant
    pub fn null() -> Self {
        Self::new(VariantData::Null)
    }

    /// A variant whose content is produced by `loader` on first access.
    pub fn delayed(loader: impl DelayedLoad + 'static) -> Self {
        Self {
            data: OnceCell::new(),
            loader: RefCell::new(Some(Box::new(loader))),
            state: Cell::new(LoadState::NotLoaded),
            dirty: false,
            immutable: false,
        }
    }

    /// Create a raw-data variant written verbatim
    pub fn raw(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(VariantData::RawData(bytes.into()))
    }

    /// Current delayed-load state
    pub fn load_state(&self) -> LoadState {
        self.state.get()
    }

    /// Check if content is available without loading
    pub fn is_loaded(&self) -> bool {
        self.state.get() == LoadState::Loaded
    }

    fn delayed_load(&self) -> Result<&VariantData> {
        if let Some(data) = self.data.get() {
            return Ok(data);
        }
        if self.state.get() == LoadState::Loading {
            return Err(PdfError::InternalLogic(
                "variant accessed while its delayed load is running".to_string(),
            ));
        }

        let mut loader = self.loader.borrow_mut().take().ok_or_else(|| {
            PdfError::InternalLogic("unloaded variant without a loader".to_string())
        })?;
        self.state.set(LoadState::Loading);
        let loaded = loader.load().and_then(Variant::into_data);
        match loaded {
            Ok(mut data) => {
                if self.immutable {
                    if let Some(container) = data.as_container_mut() {
                        container.set_immutable(true);
                    }
                }
                self.state.set(LoadState::Loaded);
                Ok(self.data.get_or_init(|| data))
            }
            Err(e) => {
                *self.loader.borrow_mut() = Some(loader);
                self.state.set(LoadState::NotLoaded);
                Err(e)
            }
        }
    }

    /// Forces the delayed load, if any.
    pub fn load(&self) -> Result<()> {
        self.delayed_load().map(|_| ())
    }

    /// Loaded content
    pub fn data(&self) -> Result<&VariantData> {
        self.delayed_load()
    }

    /// Take the loaded content
    pub fn into_data(self) -> Result<VariantData> {
        self.delayed_load()?;
        self.data
            .into_inner()
            .ok_or_else(|| PdfError::InternalLogic("loaded variant without data".to_string()))
    }

    /// Loaded content for mutation, refusing immutable variants.
    fn data_mut(&mut self, action: &str) -> Result<&mut VariantData> {
        if self.immutable {
            return Err(PdfError::ChangeOnImmutable(action.to_string()));
        }
        self.data_mut_unchecked()
    }

    pub(crate) fn data_mut_unchecked(&mut self) -> Result<&mut VariantData> {
        self.delayed_load()?;
        self.data
            .get_mut()
            .ok_or_else(|| PdfError::InternalLogic("loaded variant without data".to_string()))
    }

    /// Type of the loaded content
    pub fn data_type(&self) -> Result<DataType> {
        Ok(self.delayed_load()?.data_type())
    }

    /// Check for null
    pub fn is_null(&self) -> bool {
        matches!(self.delayed_load(), Ok(VariantData::Null))
    }

    /// Check for an indirect reference
    pub fn is_reference(&self) -> bool {
        matches!(self.delayed_load(), Ok(VariantData::Reference(_)))
    }

    /// Check for an array
    pub fn is_array(&self) -> bool {
        matches!(self.delayed_load(), Ok(VariantData::Array(_)))
    }

    /// Check for a dictionary
    pub fn is_dictionary(&self) -> bool {
        matches!(self.delayed_load(), Ok(VariantData::Dictionary(_)))
    }

    /// Get boolean value
    pub fn get_bool(&self) -> Result<bool> {
        match self.delayed_load()? {
            VariantData::Bool(value) => Ok(*value),
            other => Err(PdfError::invalid_type("Bool", other.data_type())),
        }
    }

    /// Integer value; reals are truncated.
    pub fn get_number(&self) -> Result<i64> {
        match self.delayed_load()? {
            VariantData::Number(value) => Ok(*value),
            VariantData::Real(value) => Ok(*value as i64),
            other => Err(PdfError::invalid_type("Number", other.data_type())),
        }
    }

    /// Real value; integers are widened.
    pub fn get_real(&self) -> Result<f64> {
        match self.delayed_load()? {
            VariantData::Real(value) => Ok(*value),
            VariantData::Number(value) => Ok(*value as f64),
            other => Err(PdfError::invalid_type("Real", other.data_type())),
        }
    }

    /// Get string value
    pub fn get_string(&self) -> Result<&PdfString> {
        match self.delayed_load()? {
            VariantData::String(value) => Ok(value),
            other => Err(PdfError::invalid_type("String", other.data_type())),
        }
    }

    /// Get name value
    pub fn get_name(&self) -> Result<&Name> {
        match self.delayed_load()? {
            VariantData::Name(value) => Ok(value),
            other => Err(PdfError::invalid_type("Name", other.data_type())),
        }
    }

    /// Get reference value
    pub fn get_reference(&self) -> Result<Reference> {
        match self.delayed_load()? {
            VariantData::Reference(value) => Ok(*value),
            other => Err(PdfError::invalid_type("Reference", other.data_type())),
        }
    }

    /// Get array value
    pub fn get_array(&self) -> Result<&Array> {
        match self.delayed_load()? {
            VariantData::Array(value) => Ok(value),
            other => Err(PdfError::invalid_type("Array", other.data_type())),
        }
    }

    /// Get dictionary value
    pub fn get_dictionary(&self) -> Result<&Dictionary> {
        match self.delayed_load()? {
            VariantData::Dictionary(value) => Ok(value),
            other => Err(PdfError::invalid_type("Dictionary", other.data_type())),
        }
    }

    /// Get raw data
    pub fn get_raw_data(&self) -> Result<&[u8]> {
        match self.delayed_load()? {
            VariantData::RawData(value) => Ok(value),
            other => Err(PdfError::invalid_type("RawData", other.data_type())),
        }
    }

    /// Get mutable array, refusing immutable variants
    pub fn get_array_mut(&mut self) -> Result<&mut Array> {
        match self.data_mut("array access")? {
            VariantData::Array(value) => Ok(value),
            other => Err(PdfError::invalid_type("Array", other.data_type())),
        }
    }

    /// Get mutable dictionary, refusing immutable variants
    pub fn get_dictionary_mut(&mut self) -> Result<&mut Dictionary> {
        match self.data_mut("dictionary access")? {
            VariantData::Dictionary(value) => Ok(value),
            other => Err(PdfError::invalid_type("Dictionary", other.data_type())),
        }
    }

    /// Set boolean value; the variant must already be a boolean
    pub fn set_bool(&mut self, value: bool) -> Result<()> {
        match self.data_mut("set bool")? {
            VariantData::Bool(current) => *current = value,
            other => return Err(PdfError::invalid_type("Bool", other.data_type())),
        }
        self.dirty = true;
        Ok(())
    }

    /// Sets an integer; a real variant keeps its type and receives the
    /// widened value.
    pub fn set_number(&mut self, value: i64) -> Result<()> {
        match self.data_mut("set number")? {
            VariantData::Number(current) => *current = value,
            VariantData::Real(current) => *current = value as f64,
            other => return Err(PdfError::invalid_type("Number", other.data_type())),
        }
        self.dirty = true;
        Ok(())
    }

    /// Sets a real; an integer variant keeps its type and receives the
    /// truncated value.
    pub fn set_real(&mut self, value: f64) -> Result<()> {
        match self.data_mut("set real")? {
            VariantData::Real(current) => *current = value,
            VariantData::Number(current) => *current = value as i64,
            other => return Err(PdfError::invalid_type("Real", other.data_type())),
        }
        self.dirty = true;
        Ok(())
    }

    /// Set name value; the variant must already be a name
    pub fn set_name(&mut self, value: impl Into<Name>) -> Result<()> {
        match self.data_mut("set name")? {
            VariantData::Name(current) => *current = value.into(),
            other => return Err(PdfError::invalid_type("Name", other.data_type())),
        }
        self.dirty = true;
        Ok(())
    }

    /// Set string value; the variant must already be a string
    pub fn set_string(&mut self, value: impl Into<PdfString>) -> Result<()> {
        match self.data_mut("set string")? {
            VariantData::String(current) => *current = value.into(),
            other => return Err(PdfError::invalid_type("String", other.data_type())),
        }
        self.dirty = true;
        Ok(())
    }

    /// Set reference value; the variant must already be a reference
    pub fn set_reference(&mut self, value: Reference) -> Result<()> {
        match self.data_mut("set reference")? {
            VariantData::Reference(current) => *current = value,
            other => return Err(PdfError::invalid_type("Reference", other.data_type())),
        }
        self.dirty = true;
        Ok(())
    }

    /// Replaces the whole content, including its type.
    pub fn replace(&mut self, value: impl Into<Variant>) -> Result<()> {
        if self.immutable {
            return Err(PdfError::ChangeOnImmutable("replace".to_string()));
        }
        let data = value.into().into_data()?;
        self.data = OnceCell::from(data);
        self.loader = RefCell::new(None);
        self.state.set(LoadState::Loaded);
        self.dirty = true;
        Ok(())
    }

    /// Equality that reports comparisons nothing can answer.
    ///
    /// Numbers compare against reals numerically and literal strings against
    /// hex strings by content. Any other pair of different types is unequal.
    /// Raw data cannot be compared and fails with
    /// [`PdfError::InvalidDataType`].
    pub fn try_eq(&self, other: &Variant) -> Result<bool> {
        use VariantData as V;

        let lhs = self.delayed_load()?;
        let rhs = other.delayed_load()?;
        Ok(match (lhs, rhs) {
            (V::RawData(_), _) | (_, V::RawData(_)) => {
                return Err(PdfError::InvalidDataType(
                    "raw data cannot be compared".to_string(),
                ))
            }
            (V::Null, V::Null) => true,
            (V::Bool(a), V::Bool(b)) => a == b,
            (V::Number(a), V::Number(b)) => a == b,
            (V::Real(a), V::Real(b)) => a == b,
            (V::Number(a), V::Real(b)) | (V::Real(b), V::Number(a)) => *a as f64 == *b,
            (V::String(a), V::String(b)) => a == b,
            (V::Name(a), V::Name(b)) => a == b,
            (V::Reference(a), V::Reference(b)) => a == b,
            (V::Array(a), V::Array(b)) => a == b,
            (V::Dictionary(a), V::Dictionary(b)) => a == b,
            _ => false,
        })
    }

    /// Serialize in `mode`, encrypting strings when a context is given
    pub fn write(
        &self,
        device: &mut OutputDevice<'_>,
        mode: WriteMode,
        encrypt: Option<EncryptContext<'_>>,
    ) -> Result<()> {
        self.write_until(device, mode, encrypt, None)
    }

    /// Like [`Variant::write`], but a dictionary stops right after the entry
    /// named `key_stop` and is left unterminated.
    pub fn write_until(
        &self,
        device: &mut OutputDevice<'_>,
        mode: WriteMode,
        encrypt: Option<EncryptContext<'_>>,
        key_stop: Option<&str>,
    ) -> Result<()> {
        let compact = mode.is_compact();
        let separator = |device: &mut OutputDevice<'_>| -> Result<()> {
            if compact {
                device.write(b" ")?;
            }
            Ok(())
        };

        match self.delayed_load()? {
            VariantData::Null => {
                separator(device)?;
                device.write(b"null")
            }
            VariantData::Bool(value) => {
                separator(device)?;
                device.write(if *value { b"true" } else { b"false" })
            }
            VariantData::Number(value) => {
                separator(device)?;
                device.print(format_args!("{value}"))
            }
            VariantData::Real(value) => {
                separator(device)?;
                device.write(format_real(*value, compact).as_bytes())
            }
            VariantData::String(value) => {
                let bytes = match encrypt {
                    Some(context) => Cow::Owned(context.encrypt(value.as_bytes())?),
                    None => Cow::Borrowed(value.as_bytes()),
                };
                device.write(&PdfString::encode(&bytes, value.is_hex()))
            }
            VariantData::Name(value) => {
                device.write(b"/")?;
                device.write(&value.escaped())
            }
            VariantData::Reference(value) => {
                separator(device)?;
                device.print(format_args!(
                    "{} {} R",
                    value.number(),
                    value.generation()
                ))
            }
            VariantData::Array(value) => value.write(device, mode, encrypt),
            VariantData::Dictionary(value) => value.write(device, mode, encrypt, key_stop),
            VariantData::RawData(value) => device.write(value),
        }
    }

    /// Serialized form as text.
    pub fn to_pdf_string(&self, mode: WriteMode) -> Result<String> {
        let mut device = OutputDevice::memory();
        self.write(&mut device, mode, None)?;
        let bytes = device.into_bytes().unwrap_or_default();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Fixed six-digit notation, never exponential. Compact mode strips
/// trailing zeros and a trailing decimal point.
pub(crate) fn format_real(value: f64, compact: bool) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let mut text = format!("{value:.6}");
    if compact && text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.');
        text = match trimmed {
            "" | "-" | "-0" => "0".to_string(),
            other => other.to_string(),
        };
    }
    text
}

impl Container for Variant {
    fn is_dirty(&self) -> bool {
        self.dirty
            || self
                .data
                .get()
                .and_then(VariantData::as_container)
                .is_some_and(|container| container.is_dirty())
    }

    fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
        if !dirty {
            if let Some(container) = self.data.get_mut().and_then(VariantData::as_container_mut) {
                container.set_dirty(false);
            }
        }
    }

    fn is_immutable(&self) -> bool {
        self.immutable
    }

    fn set_immutable(&mut self, immutable: bool) {
        self.immutable = immutable;
        if let Some(container) = self.data.get_mut().and_then(VariantData::as_container_mut) {
            container.set_immutable(immutable);
        }
    }
}

/// Copies load the source first. A source that cannot be loaded copies as
/// null. The copy is clean and mutable.
impl Clone for Variant {
    fn clone(&self) -> Self {
        match self.try_clone() {
            Ok(copy) => copy,
            Err(e) => {
                warn!("Copying a variant that failed to load: {}", e);
                Variant::null()
            }
        }
    }
}

impl Variant {
    /// Deep copy that reports a failed delayed load
    pub fn try_clone(&self) -> Result<Variant> {
        Ok(Variant::new(self.delayed_load()?.clone()))
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        self.try_eq(other).unwrap_or(false)
    }
}

impl Default for Variant {
    fn default() -> Self {
        Variant::null()
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.data.get() {
            Some(data) => data.fmt(f),
            None => write!(f, "Variant({:?})", self.state.get()),
        }
    }
}

impl From<VariantData> for Variant {
    fn from(data: VariantData) -> Self {
        Variant::new(data)
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Variant::new(VariantData::Bool(value))
    }
}

impl From<i32> for Variant {
    fn from(value: i32) -> Self {
        Variant::new(VariantData::Number(value.into()))
    }
}

impl From<i64> for Variant {
    fn from(value: i64) -> Self {
        Variant::new(VariantData::Number(value))
    }
}

impl From<u32> for Variant {
    fn from(value: u32) -> Self {
        Variant::new(VariantData::Number(value.into()))
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Variant::new(VariantData::Real(value))
    }
}

impl From<f32> for Variant {
    fn from(value: f32) -> Self {
        Variant::new(VariantData::Real(value.into()))
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::new(VariantData::String(PdfString::from(value)))
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Variant::new(VariantData::String(PdfString::from(value)))
    }
}

impl From<PdfString> for Variant {
    fn from(value: PdfString) -> Self {
        Variant::new(VariantData::String(value))
    }
}

impl From<Name> for Variant {
    fn from(value: Name) -> Self {
        Variant::new(VariantData::Name(value))
    }
}

impl From<Reference> for Variant {
    fn from(value: Reference) -> Self {
        Variant::new(VariantData::Reference(value))
    }
}

impl From<Array> for Variant {
    fn from(value: Array) -> Self {
        Variant::new(VariantData::Array(value))
    }
}

impl From<Vec<Variant>> for Variant {
    fn from(value: Vec<Variant>) -> Self {
        Variant::new(VariantData::Array(Array::from(value)))
    }
}

impl From<Dictionary> for Variant {
    fn from(value: Dictionary) -> Self {
        Variant::new(VariantData::Dictionary(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::cell::Cell;
    use std::rc::Rc;

    fn clean(variant: &Variant) -> String {
        variant.to_pdf_string(WriteMode::CLEAN).unwrap()
    }

    fn compact(variant: &Variant) -> String {
        variant.to_pdf_string(WriteMode::COMPACT).unwrap()
    }

    #[test]
    fn test_scalar_serialization() {
        assert_eq!(clean(&Variant::null()), "null");
        assert_eq!(compact(&Variant::null()), " null");
        assert_eq!(clean(&Variant::from(true)), "true");
        assert_eq!(clean(&Variant::from(-17i64)), "-17");
        assert_eq!(compact(&Variant::from(42)), " 42");
        assert_eq!(clean(&Variant::from(Reference::new(5, 2))), "5 2 R");
        assert_eq!(clean(&Variant::from(Name::new("Type"))), "/Type");
        assert_eq!(clean(&Variant::from("a(b)")), "(a\\(b\\))");
        assert_eq!(clean(&Variant::raw(b"BT ET".to_vec())), "BT ET");
    }

    #[test]
    fn test_real_serialization() {
        assert_eq!(clean(&Variant::from(3.0)), "3.000000");
        assert_eq!(compact(&Variant::from(3.0)), " 3");
        assert_eq!(compact(&Variant::from(0.25)), " 0.25");
        assert_eq!(compact(&Variant::from(-0.0000001)), " 0");
        assert_eq!(clean(&Variant::from(1.0e20)), "100000000000000000000.000000");
        assert_eq!(format_real(f64::NAN, true), "0");
    }

    #[test]
    fn test_accessor_type_mismatch() {
        let variant = Variant::from(Name::new("Catalog"));
        let err = variant.get_bool().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDataType);
        assert_eq!(variant.data_type().unwrap(), DataType::Name);
    }

    #[test]
    fn test_numeric_widening() {
        let mut number = Variant::from(7);
        assert_eq!(number.get_real().unwrap(), 7.0);
        number.set_real(2.9).unwrap();
        assert_eq!(number.data_type().unwrap(), DataType::Number);
        assert_eq!(number.get_number().unwrap(), 2);

        let mut real = Variant::from(1.5);
        real.set_number(4).unwrap();
        assert_eq!(real.data_type().unwrap(), DataType::Real);
        assert_eq!(real.get_real().unwrap(), 4.0);
    }

    #[test]
    fn test_setter_marks_dirty() {
        let mut variant = Variant::from(false);
        assert!(!variant.is_dirty());
        variant.set_bool(true).unwrap();
        assert!(variant.is_dirty());
        variant.set_dirty(false);
        assert!(!variant.is_dirty());
    }

    #[test]
    fn test_immutable_rejects_changes() {
        let mut variant = Variant::from(1);
        variant.set_immutable(true);
        let err = variant.set_number(2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChangeOnImmutable);
        assert_eq!(
            variant.replace(Variant::null()).unwrap_err().kind(),
            ErrorKind::ChangeOnImmutable
        );
        assert_eq!(variant.get_number().unwrap(), 1);
    }

    #[test]
    fn test_equality_rules() {
        assert_eq!(Variant::from(2), Variant::from(2.0));
        assert_ne!(Variant::from(2), Variant::from(true));
        assert_eq!(
            Variant::from(PdfString::new("ab")),
            Variant::from(PdfString::hex("ab"))
        );
        let raw = Variant::raw(b"x".to_vec());
        assert_eq!(
            raw.try_eq(&Variant::null()).unwrap_err().kind(),
            ErrorKind::InvalidDataType
        );
        assert_ne!(raw, Variant::null());
    }

    #[test]
    fn test_delayed_load_runs_once() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let variant = Variant::delayed(move || -> Result<Variant> {
            counter.set(counter.get() + 1);
            Ok(Variant::from(99))
        });

        assert_eq!(variant.load_state(), LoadState::NotLoaded);
        assert_eq!(variant.get_number().unwrap(), 99);
        assert_eq!(clean(&variant), "99");
        assert_eq!(calls.get(), 1);
        assert!(variant.is_loaded());
        assert!(!variant.is_dirty());
    }

    #[test]
    fn test_failed_load_can_retry() {
        let attempts = Rc::new(Cell::new(0));
        let counter = attempts.clone();
        let variant = Variant::delayed(move || -> Result<Variant> {
            counter.set(counter.get() + 1);
            if counter.get() == 1 {
                Err(PdfError::UnexpectedEof("truncated".to_string()))
            } else {
                Ok(Variant::from(true))
            }
        });

        assert_eq!(variant.load().unwrap_err().kind(), ErrorKind::UnexpectedEof);
        assert_eq!(variant.load_state(), LoadState::NotLoaded);
        assert!(variant.get_bool().unwrap());
        assert_eq!(attempts.get(), 2);
    }

    #[test]
    fn test_reentrant_access_during_load() {
        let seen = Rc::new(Cell::new(None));
        let observed = seen.clone();
        let variant = Rc::new_cyclic(|this: &std::rc::Weak<Variant>| {
            let this = this.clone();
            Variant::delayed(move || -> Result<Variant> {
                let inner = this.upgrade().ok_or_else(|| {
                    PdfError::InternalLogic("variant dropped".to_string())
                })?;
                assert_eq!(inner.load_state(), LoadState::Loading);
                observed.set(inner.get_number().err().map(|e| e.kind()));
                Ok(Variant::from(1))
            })
        });

        assert_eq!(variant.get_number().unwrap(), 1);
        assert_eq!(seen.get(), Some(ErrorKind::InternalLogic));
        assert_eq!(variant.load_state(), LoadState::Loaded);
    }

    #[test]
    fn test_clone_of_failing_variant_is_null() {
        let variant = Variant::delayed(|| -> Result<Variant> {
            Err(PdfError::UnexpectedEof("gone".to_string()))
        });
        assert!(variant.try_clone().is_err());
        assert!(variant.clone().is_null());
    }

    #[test]
    fn test_clone_is_clean_and_mutable() {
        let mut variant = Variant::from(5);
        variant.set_number(6).unwrap();
        variant.set_immutable(true);

        let mut copy = variant.clone();
        assert!(!copy.is_dirty());
        assert!(!copy.is_immutable());
        copy.set_number(7).unwrap();
        assert_eq!(variant.get_number().unwrap(), 6);
    }

    #[test]
    fn test_replace_changes_type() {
        let mut variant = Variant::from(1);
        variant.replace(Name::new("Pages")).unwrap();
        assert_eq!(variant.get_name().unwrap(), "Pages");
        assert!(variant.is_dirty());
    }

    #[test]
    fn test_immutable_applies_after_delayed_load() {
        let mut variant = Variant::delayed(|| -> Result<Variant> {
            Ok(Variant::from(vec![Variant::from(1)]))
        });
        variant.set_immutable(true);
        assert!(variant.get_array().unwrap().is_immutable());
    }
}
