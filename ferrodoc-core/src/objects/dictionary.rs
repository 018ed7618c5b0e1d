use super::{Container, Name, Variant, WriteMode};
use crate::device::OutputDevice;
use crate::encrypt::EncryptContext;
use crate::error::{PdfError, Result};
use std::collections::BTreeMap;

/// Name-keyed map of variants, iterated in key order.
#[derive(Debug, Default)]
pub struct Dictionary {
    entries: BTreeMap<Name, Variant>,
    dirty: bool,
    immutable: bool,
}

impl Dictionary {
    /// Create an empty dictionary
    pub fn new() -> Self {
        Self::default()
    }

    /// A dictionary carrying `/Type /type_name`.
    pub fn with_type(type_name: &str) -> Self {
        let mut dict = Self::new();
        dict.entries
            .insert(Name::new(Name::TYPE), Variant::from(Name::new(type_name)));
        dict
    }

    fn check_mutable(&self, action: &str) -> Result<()> {
        if self.immutable {
            return Err(PdfError::ChangeOnImmutable(format!("dictionary {action}")));
        }
        Ok(())
    }

    /// Inserts or replaces the entry for `key`.
    pub fn set(&mut self, key: impl Into<Name>, value: impl Into<Variant>) -> Result<()> {
        self.check_mutable("set")?;
        self.entries.insert(key.into(), value.into());
        self.dirty = true;
        Ok(())
    }

    /// Value stored under `key`
    pub fn get(&self, key: &str) -> Option<&Variant> {
        self.entries.get(key.as_bytes())
    }

    /// Mutable entry access; the dictionary is assumed modified when the key
    /// exists.
    pub fn get_mut(&mut self, key: &str) -> Result<Option<&mut Variant>> {
        self.check_mutable("entry access")?;
        let entry = self.entries.get_mut(key.as_bytes());
        if entry.is_some() {
            self.dirty = true;
        }
        Ok(entry)
    }

    /// Remove and return the entry for `key`
    pub fn remove(&mut self, key: &str) -> Result<Option<Variant>> {
        self.check_mutable("remove")?;
        let removed = self.entries.remove(key.as_bytes());
        if removed.is_some() {
            self.dirty = true;
        }
        Ok(removed)
    }

    /// Check if `key` is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key.as_bytes())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the dictionary has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove all entries
    pub fn clear(&mut self) -> Result<()> {
        self.check_mutable("clear")?;
        if !self.entries.is_empty() {
            self.entries.clear();
            self.dirty = true;
        }
        Ok(())
    }

    /// Keys in order
    pub fn keys(&self) -> impl Iterator<Item = &Name> {
        self.entries.keys()
    }

    /// Values in key order
    pub fn values(&self) -> impl Iterator<Item = &Variant> {
        self.entries.values()
    }

    /// Iterate over entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Variant)> {
        self.entries.iter()
    }

    pub(crate) fn values_mut_unchecked(&mut self) -> impl Iterator<Item = &mut Variant> {
        self.entries.values_mut()
    }

    /// Sets an entry maintained by the crate itself, regardless of
    /// immutability. Marks dirty only when the value changes.
    pub(crate) fn sync_entry(&mut self, key: &str, value: Variant) {
        if self.entries.get(key.as_bytes()) != Some(&value) {
            self.entries.insert(Name::new(key), value);
            self.dirty = true;
        }
    }

    pub(crate) fn remove_unchecked(&mut self, key: &str) {
        if self.entries.remove(key.as_bytes()).is_some() {
            self.dirty = true;
        }
    }

    /// Dictionary under `key`, if present and a dictionary
    pub fn get_dict(&self, key: &str) -> Option<&Dictionary> {
        self.get(key).and_then(|value| value.get_dictionary().ok())
    }

    /// Name under `key`, if present and a name
    pub fn get_name(&self, key: &str) -> Option<&Name> {
        self.get(key).and_then(|value| value.get_name().ok())
    }

    /// `/Type` of this dictionary, if present and a name.
    pub fn type_name(&self) -> Option<&Name> {
        self.get_name(Name::TYPE)
    }

    /// Integer under `key`, or `default` when missing or not numeric.
    pub fn get_number_or(&self, key: &str, default: i64) -> i64 {
        self.get(key)
            .and_then(|value| value.get_number().ok())
            .unwrap_or(default)
    }

    /// Real under `key`, or `default`
    pub fn get_real_or(&self, key: &str, default: f64) -> f64 {
        self.get(key)
            .and_then(|value| value.get_real().ok())
            .unwrap_or(default)
    }

    /// Boolean under `key`, or `default`
    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .and_then(|value| value.get_bool().ok())
            .unwrap_or(default)
    }

    /// Serializes the dictionary with `/Type` first. When `key_stop` names
    /// an entry, output ends right after it and the closing `>>` is omitted.
    pub fn write(
        &self,
        device: &mut OutputDevice<'_>,
        mode: WriteMode,
        encrypt: Option<EncryptContext<'_>>,
        key_stop: Option<&str>,
    ) -> Result<()> {
        let clean = mode.is_clean();
        device.write(if clean { b"<<\n" } else { b"<<" })?;

        let type_entry = self.entries.get_key_value(Name::TYPE.as_bytes());
        let others = self
            .entries
            .iter()
            .filter(|(key, _)| **key != *Name::TYPE);
        for (key, value) in type_entry.into_iter().chain(others) {
            device.write(b"/")?;
            device.write(&key.escaped())?;
            if clean {
                device.write(b" ")?;
            }
            value.write(device, mode, encrypt)?;
            if clean {
                device.write(b"\n")?;
            }
            if key_stop.is_some_and(|stop| *key == *stop) {
                return Ok(());
            }
        }
        device.write(b">>")
    }
}

impl Container for Dictionary {
    fn is_dirty(&self) -> bool {
        self.dirty || self.entries.values().any(Container::is_dirty)
    }

    fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
        if !dirty {
            for value in self.entries.values_mut() {
                value.set_dirty(false);
            }
        }
    }

    fn is_immutable(&self) -> bool {
        self.immutable
    }

    fn set_immutable(&mut self, immutable: bool) {
        self.immutable = immutable;
        for value in self.entries.values_mut() {
            value.set_immutable(immutable);
        }
    }
}

/// Deep copy; the copy is clean and mutable.
impl Clone for Dictionary {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            dirty: false,
            immutable: false,
        }
    }
}

impl PartialEq for Dictionary {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K: Into<Name>> FromIterator<(K, Variant)> for Dictionary {
    fn from_iter<T: IntoIterator<Item = (K, Variant)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            ..Self::default()
        }
    }
}
