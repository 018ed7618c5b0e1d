use super::{Container, Variant, WriteMode};
use crate::device::OutputDevice;
use crate::encrypt::EncryptContext;
use crate::error::{PdfError, Result};

/// Ordered sequence of variants.
#[derive(Debug, Default)]
pub struct Array {
    elements: Vec<Variant>,
    dirty: bool,
    immutable: bool,
}

impl Array {
    /// Create an empty array
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty array with room for `capacity` values
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            elements: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    fn check_mutable(&self, action: &str) -> Result<()> {
        if self.immutable {
            return Err(PdfError::ChangeOnImmutable(format!("array {action}")));
        }
        Ok(())
    }

    fn check_index(&self, index: usize, len: usize) -> Result<()> {
        if index >= len {
            return Err(PdfError::ValueOutOfRange(format!(
                "index {index} in array of length {}",
                self.elements.len()
            )));
        }
        Ok(())
    }

    /// Append a value
    pub fn push(&mut self, value: impl Into<Variant>) -> Result<()> {
        self.check_mutable("push")?;
        self.elements.push(value.into());
        self.dirty = true;
        Ok(())
    }

    /// Remove and return the last value
    pub fn pop(&mut self) -> Result<Option<Variant>> {
        self.check_mutable("pop")?;
        let popped = self.elements.pop();
        if popped.is_some() {
            self.dirty = true;
        }
        Ok(popped)
    }

    /// Inserts before `index`; `index == len()` appends.
    pub fn insert(&mut self, index: usize, value: impl Into<Variant>) -> Result<()> {
        self.check_mutable("insert")?;
        self.check_index(index, self.elements.len() + 1)?;
        self.elements.insert(index, value.into());
        self.dirty = true;
        Ok(())
    }

    /// Remove and return the value at `index`
    pub fn remove(&mut self, index: usize) -> Result<Variant> {
        self.check_mutable("remove")?;
        self.check_index(index, self.elements.len())?;
        self.dirty = true;
        Ok(self.elements.remove(index))
    }

    /// Replace the value at `index`
    pub fn set(&mut self, index: usize, value: impl Into<Variant>) -> Result<()> {
        self.check_mutable("set")?;
        self.check_index(index, self.elements.len())?;
        self.elements[index] = value.into();
        self.dirty = true;
        Ok(())
    }

    /// Remove all values
    pub fn clear(&mut self) -> Result<()> {
        self.check_mutable("clear")?;
        if !self.elements.is_empty() {
            self.elements.clear();
            self.dirty = true;
        }
        Ok(())
    }

    /// Value at `index`, if any
    pub fn get(&self, index: usize) -> Option<&Variant> {
        self.elements.get(index)
    }

    /// Mutable element access; the array is assumed modified.
    pub fn get_mut(&mut self, index: usize) -> Result<&mut Variant> {
        self.check_mutable("element access")?;
        self.check_index(index, self.elements.len())?;
        self.dirty = true;
        Ok(&mut self.elements[index])
    }

    /// First value
    pub fn first(&self) -> Option<&Variant> {
        self.elements.first()
    }

    /// Last value
    pub fn last(&self) -> Option<&Variant> {
        self.elements.last()
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Check if the array has no values
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Check if any value equals `value`
    pub fn contains(&self, value: &Variant) -> bool {
        self.elements.iter().any(|element| element == value)
    }

    /// Values as a slice
    pub fn as_slice(&self) -> &[Variant] {
        &self.elements
    }

    /// Iterate over values
    pub fn iter(&self) -> std::slice::Iter<'_, Variant> {
        self.elements.iter()
    }

    pub(crate) fn iter_mut_unchecked(&mut self) -> std::slice::IterMut<'_, Variant> {
        self.elements.iter_mut()
    }

    /// Serialize as `[...]`
    pub fn write(
        &self,
        device: &mut OutputDevice<'_>,
        mode: WriteMode,
        encrypt: Option<EncryptContext<'_>>,
    ) -> Result<()> {
        let clean = mode.is_clean();
        device.write(if clean { b"[ " } else { b"[" })?;
        for (i, element) in self.elements.iter().enumerate() {
            element.write(device, mode, encrypt)?;
            if clean {
                device.write(if (i + 1) % 10 == 0 { b"\n" } else { b" " })?;
            }
        }
        device.write(b"]")
    }
}

impl Container for Array {
    fn is_dirty(&self) -> bool {
        self.dirty || self.elements.iter().any(Container::is_dirty)
    }

    fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
        if !dirty {
            for element in &mut self.elements {
                element.set_dirty(false);
            }
        }
    }

    fn is_immutable(&self) -> bool {
        self.immutable
    }

    fn set_immutable(&mut self, immutable: bool) {
        self.immutable = immutable;
        for element in &mut self.elements {
            element.set_immutable(immutable);
        }
    }
}

/// Deep copy; the copy is clean and mutable.
impl Clone for Array {
    fn clone(&self) -> Self {
        Self {
            elements: self.elements.clone(),
            dirty: false,
            immutable: false,
        }
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
    }
}

impl From<Vec<Variant>> for Array {
    fn from(elements: Vec<Variant>) -> Self {
        Self {
            elements,
            ..Self::default()
        }
    }
}

impl From<Array> for Vec<Variant> {
    fn from(array: Array) -> Self {
        array.elements
    }
}

impl FromIterator<Variant> for Array {
    fn from_iter<T: IntoIterator<Item = Variant>>(iter: T) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<'a> IntoIterator for &'a Array {
    type Item = &'a Variant;
    type IntoIter = std::slice::Iter<'a, Variant>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl IntoIterator for Array {
    type Item = Variant;
    type IntoIter = std::vec::IntoIter<Variant>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}
