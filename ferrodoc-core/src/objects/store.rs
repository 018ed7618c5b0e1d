//! Object store
//!
//! Owns the indirect objects of one document, hands out fresh references,
//! recycles the numbers of removed objects and resolves references.

use super::{Container, DelayedLoad, Dictionary, Object, Reference, Stream, Variant, VariantData};
use crate::error::{PdfError, Result};
use crate::filters::FilterType;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace, warn};

/// Highest generation number. An entry at this generation is never reused.
pub const MAX_GENERATION: u16 = u16::MAX;

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an [`ObjectStore`], recorded as the owner of its objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreId(u64);

impl StoreId {
    fn next() -> Self {
        Self(NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Allocate from the free list before using new numbers.
    pub reuse_object_numbers: bool,
    /// Filters applied by [`ObjectStore::create_stream_object`].
    pub stream_filters: Vec<FilterType>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            reuse_object_numbers: true,
            stream_filters: if cfg!(feature = "compression") {
                vec![FilterType::FlateDecode]
            } else {
                Vec::new()
            },
        }
    }
}

impl StoreOptions {
    /// Set whether freed object numbers are handed out again
    pub fn with_reuse_object_numbers(mut self, reuse: bool) -> Self {
        self.reuse_object_numbers = reuse;
        self
    }

    /// Set the filters applied by `create_stream_object`
    pub fn with_stream_filters(mut self, filters: Vec<FilterType>) -> Self {
        self.stream_filters = filters;
        self
    }
}

#[derive(Debug)]
pub struct ObjectStore {
    id: StoreId,
    objects: BTreeMap<Reference, Object>,
    /// Free entries, stored with the generation their next use gets.
    free: BTreeSet<Reference>,
    /// Next never-used object number; one past `u32::MAX` once exhausted.
    next_number: u64,
    options: StoreOptions,
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore {
    /// Create an empty store with default options
    pub fn new() -> Self {
        Self::with_options(StoreOptions::default())
    }

    /// Create an empty store
    pub fn with_options(options: StoreOptions) -> Self {
        Self {
            id: StoreId::next(),
            objects: BTreeMap::new(),
            free: BTreeSet::new(),
            next_number: 1,
            options,
        }
    }

    /// Identity used to check object ownership
    pub fn id(&self) -> StoreId {
        self.id
    }

    /// Get store options
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if the store holds no objects
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Highest object number ever handed out or pushed.
    pub fn max_object_number(&self) -> u32 {
        u32::try_from(self.next_number - 1).unwrap_or(u32::MAX)
    }

    /// Objects in reference order.
    pub fn iter(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    /// Objects in reference order, mutably
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Object> {
        self.objects.values_mut()
    }

    /// References of all stored objects
    pub fn references(&self) -> impl Iterator<Item = Reference> + '_ {
        self.objects.keys().copied()
    }

    /// Free entries in number order. Retired entries carry
    /// [`MAX_GENERATION`].
    pub fn free_objects(&self) -> impl Iterator<Item = Reference> + '_ {
        self.free.iter().copied()
    }

    fn next_free_reference(&mut self) -> Result<Reference> {
        if self.options.reuse_object_numbers {
            let reusable = self
                .free
                .iter()
                .find(|reference| reference.generation() < MAX_GENERATION)
                .copied();
            if let Some(reference) = reusable {
                self.free.remove(&reference);
                return Ok(reference);
            }
        }
        let number = u32::try_from(self.next_number).map_err(|_| {
            PdfError::ValueOutOfRange(format!("object numbers exhausted after {}", u32::MAX))
        })?;
        self.next_number += 1;
        Ok(Reference::new(number, 0))
    }

    /// Allocates a reference and stores `variant` under it. Fails with
    /// `ValueOutOfRange` once every object number is taken.
    pub fn create_object(&mut self, variant: impl Into<Variant>) -> Result<Reference> {
        let reference = self.next_free_reference()?;
        trace!("Created object {}", reference);
        self.insert(Object::new(reference, variant));
        Ok(reference)
    }

    /// Creates an empty dictionary object, with `/Type` when given.
    pub fn create_dictionary_object(&mut self, type_name: Option<&str>) -> Result<Reference> {
        let dict = match type_name {
            Some(type_name) => Dictionary::with_type(type_name),
            None => Dictionary::new(),
        };
        self.create_object(dict)
    }

    /// Creates a stream object, encoding `data` with the default filters.
    pub fn create_stream_object(&mut self, dictionary: Dictionary, data: &[u8]) -> Result<Reference> {
        let mut stream = Stream::new();
        stream.set(data, &self.options.stream_filters)?;
        let reference = self.create_object(dictionary)?;
        if let Some(object) = self.objects.get_mut(&reference) {
            object.attach_stream(stream);
        }
        Ok(reference)
    }

    fn insert(&mut self, mut object: Object) {
        object.set_owner(Some(self.id));
        self.objects.insert(object.reference(), object);
    }

    /// Inserts an object under its own reference and takes ownership of it.
    /// An object already stored under the same number is replaced and
    /// returned.
    pub fn push_object(&mut self, object: Object) -> Option<Object> {
        let reference = object.reference();
        let number = reference.number();

        let existing = self
            .objects
            .range(Reference::new(number, 0)..=Reference::new(number, MAX_GENERATION))
            .next()
            .map(|(existing, _)| *existing);
        let replaced = existing.and_then(|existing| {
            warn!("Replacing object {} with {}", existing, reference);
            self.objects.remove(&existing)
        });

        self.free.retain(|free| free.number() != number);
        self.next_number = self.next_number.max(u64::from(number) + 1);
        self.insert(object);

        replaced.map(|mut replaced| {
            replaced.set_owner(None);
            replaced
        })
    }

    /// Stores an object whose content is produced by `loader` on first
    /// access.
    pub fn push_delayed(
        &mut self,
        reference: Reference,
        loader: impl DelayedLoad + 'static,
    ) -> Option<Object> {
        self.push_object(Object::new(reference, Variant::delayed(loader)))
    }

    /// Records a free entry as read from a file. Its number becomes
    /// reusable with the recorded generation.
    pub fn add_free_object(&mut self, reference: Reference) {
        self.next_number = self.next_number.max(u64::from(reference.number()) + 1);
        self.free.retain(|free| free.number() != reference.number());
        if reference.generation() == MAX_GENERATION {
            debug!("Free entry {} is retired", reference);
        }
        self.free.insert(reference);
    }

    fn release_number(&mut self, reference: Reference) {
        match reference.generation().checked_add(1) {
            Some(generation) if generation < MAX_GENERATION => {
                self.free
                    .insert(Reference::new(reference.number(), generation));
            }
            _ => {
                warn!(
                    "Object number {} exhausted its generations and is retired",
                    reference.number()
                );
                self.free
                    .insert(Reference::new(reference.number(), MAX_GENERATION));
            }
        }
    }

    /// Get object by reference
    pub fn get_object(&self, reference: Reference) -> Option<&Object> {
        self.objects.get(&reference)
    }

    /// Get mutable object by reference
    pub fn get_object_mut(&mut self, reference: Reference) -> Option<&mut Object> {
        self.objects.get_mut(&reference)
    }

    /// Check if an object is stored under `reference`
    pub fn contains(&self, reference: Reference) -> bool {
        self.objects.contains_key(&reference)
    }

    /// Removes an object and frees its number. The returned object no longer
    /// has an owner.
    pub fn remove_object(&mut self, reference: Reference) -> Option<Object> {
        let mut object = self.objects.remove(&reference)?;
        object.set_owner(None);
        self.release_number(reference);
        trace!("Removed object {}", reference);
        Some(object)
    }

    /// Follows one reference. Values that are not references resolve to
    /// themselves; a dangling reference resolves to `None`.
    pub fn resolve<'a>(&'a self, value: &'a Variant) -> Option<&'a Variant> {
        match value.data() {
            Ok(VariantData::Reference(reference)) => {
                let resolved = self.get_object(*reference).map(Object::variant);
                if resolved.is_none() {
                    debug!("Reference {} does not resolve", reference);
                }
                resolved
            }
            _ => Some(value),
        }
    }

    /// Forces every delayed object to load.
    pub fn load_all(&self) -> Result<()> {
        for object in self.objects.values() {
            object.variant().load()?;
        }
        Ok(())
    }

    /// Remove all objects and free entries
    pub fn clear(&mut self) {
        self.objects.clear();
        self.free.clear();
        self.next_number = 1;
    }

    /// Moves every object of `other` into this store, shifting its object
    /// numbers (and every reference inside its objects) past the numbers in
    /// use here. Returns the offset applied.
    pub fn import(&mut self, other: ObjectStore) -> Result<u32> {
        let offset = self.max_object_number();
        if u64::from(offset) + u64::from(other.max_object_number()) > u64::from(u32::MAX) {
            return Err(PdfError::ValueOutOfRange(format!(
                "importing {} objects past number {} exceeds the object number space",
                other.max_object_number(),
                offset
            )));
        }
        let ObjectStore { objects, free, .. } = other;

        let mut shifted = Vec::with_capacity(objects.len());
        for (_, mut object) in objects {
            offset_references(object.variant_mut(), offset)?;
            let reference = shift(object.reference(), offset)?;
            object.set_reference(reference);
            shifted.push(object);
        }
        for object in shifted {
            self.push_object(object);
        }
        for reference in free {
            self.add_free_object(shift(reference, offset)?);
        }
        debug!("Imported objects with offset {}", offset);
        Ok(offset)
    }

    /// Every reference reachable from `value`, following references through
    /// the store. Cycles are allowed; dangling references are included.
    pub fn object_dependencies(&self, value: &Variant) -> Result<BTreeSet<Reference>> {
        self.dependencies_of(vec![value])
    }

    fn dependencies_of<'a>(&'a self, mut pending: Vec<&'a Variant>) -> Result<BTreeSet<Reference>> {
        let mut visited = BTreeSet::new();
        while let Some(current) = pending.pop() {
            match current.data()? {
                VariantData::Reference(reference) => {
                    if visited.insert(*reference) {
                        match self.get_object(*reference) {
                            Some(object) => pending.push(object.variant()),
                            None => debug!("Dependency {} does not resolve", reference),
                        }
                    }
                }
                VariantData::Array(array) => pending.extend(array.iter()),
                VariantData::Dictionary(dict) => pending.extend(dict.values()),
                _ => {}
            }
        }
        Ok(visited)
    }

    /// Removes every object not reachable from `trailer` and returns the
    /// removed references.
    pub fn collect_garbage(&mut self, trailer: &Dictionary) -> Result<Vec<Reference>> {
        let reachable = self.dependencies_of(trailer.values().collect())?;
        let unreachable: Vec<Reference> = self
            .objects
            .keys()
            .filter(|reference| !reachable.contains(reference))
            .copied()
            .collect();
        for reference in &unreachable {
            self.remove_object(*reference);
        }
        debug!("Collected {} unreachable objects", unreachable.len());
        Ok(unreachable)
    }

    /// Renumbers the objects `1..=n` with generation 0 in their current
    /// order, rewriting every reference including those in `trailer`.
    /// Dangling references become null. The free list is cleared.
    pub fn renumber(&mut self, trailer: &mut Dictionary) -> Result<()> {
        let mapping: HashMap<Reference, Reference> = self
            .objects
            .keys()
            .zip(1u32..)
            .map(|(old, number)| (*old, Reference::new(number, 0)))
            .collect();
        let mut remap = |reference: Reference| {
            let mapped = mapping.get(&reference).copied();
            if mapped.is_none() {
                warn!("Dangling reference {} dropped while renumbering", reference);
            }
            mapped
        };

        let objects = std::mem::take(&mut self.objects);
        for (old, mut object) in objects {
            rewrite_references(object.variant_mut(), &mut remap)?;
            let reference = mapping.get(&old).copied().unwrap_or(old);
            object.set_reference(reference);
            self.objects.insert(reference, object);
        }
        for value in trailer.values_mut_unchecked() {
            rewrite_references(value, &mut remap)?;
        }

        self.free.clear();
        self.next_number = self.objects.len() as u64 + 1;
        Ok(())
    }
}

/// Adds `offset` to the object number of every reference inside `value`.
pub fn offset_references(value: &mut Variant, offset: u32) -> Result<()> {
    let mut overflow = None;
    rewrite_references(value, &mut |reference| match reference.offset_by(offset) {
        Some(shifted) => Some(shifted),
        None => {
            overflow.get_or_insert(reference);
            Some(reference)
        }
    })?;
    match overflow {
        Some(reference) => Err(out_of_range(reference, offset)),
        None => Ok(()),
    }
}

fn shift(reference: Reference, offset: u32) -> Result<Reference> {
    reference
        .offset_by(offset)
        .ok_or_else(|| out_of_range(reference, offset))
}

fn out_of_range(reference: Reference, offset: u32) -> PdfError {
    PdfError::ValueOutOfRange(format!("{reference} cannot be shifted by {offset}"))
}

/// Replaces every nested reference by `map(reference)`, or null when it
/// yields `None`. Immutability does not apply to this structural fix-up.
fn rewrite_references(
    value: &mut Variant,
    map: &mut dyn FnMut(Reference) -> Option<Reference>,
) -> Result<()> {
    let mut changed = false;
    let mut dangling = false;
    match value.data_mut_unchecked()? {
        VariantData::Reference(reference) => {
            changed = true;
            match map(*reference) {
                Some(mapped) => *reference = mapped,
                None => dangling = true,
            }
        }
        VariantData::Array(array) => {
            for item in array.iter_mut_unchecked() {
                rewrite_references(item, map)?;
            }
        }
        VariantData::Dictionary(dict) => {
            for item in dict.values_mut_unchecked() {
                rewrite_references(item, map)?;
            }
        }
        _ => {}
    }
    if dangling {
        *value.data_mut_unchecked()? = VariantData::Null;
    }
    if changed {
        value.set_dirty(true);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::objects::Name;

    #[test]
    fn test_fresh_store_allocates_from_one() {
        let mut store = ObjectStore::new();
        assert_eq!(store.create_object(1).unwrap(), Reference::new(1, 0));
        assert_eq!(store.create_object(2).unwrap(), Reference::new(2, 0));
        assert_eq!(store.len(), 2);
        assert_eq!(store.max_object_number(), 2);
    }

    #[test]
    fn test_removed_number_is_reused_with_next_generation() {
        let mut store = ObjectStore::new();
        let first = store.create_object(1).unwrap();
        store.create_object(2).unwrap();

        let removed = store.remove_object(first).unwrap();
        assert!(removed.owner().is_none());
        assert_eq!(store.free_objects().collect::<Vec<_>>(), vec![Reference::new(1, 1)]);

        assert_eq!(store.create_object(3).unwrap(), Reference::new(1, 1));
        assert_eq!(store.free_objects().count(), 0);
        assert_eq!(store.create_object(4).unwrap(), Reference::new(3, 0));
    }

    #[test]
    fn test_reuse_can_be_disabled() {
        let mut store =
            ObjectStore::with_options(StoreOptions::default().with_reuse_object_numbers(false));
        let first = store.create_object(1).unwrap();
        store.remove_object(first);
        assert_eq!(store.create_object(2).unwrap(), Reference::new(2, 0));
    }

    #[test]
    fn test_exhausted_generation_is_retired() {
        let mut store = ObjectStore::new();
        store.push_object(Object::new(Reference::new(1, 65534), 0));
        store.remove_object(Reference::new(1, 65534));

        assert_eq!(
            store.free_objects().collect::<Vec<_>>(),
            vec![Reference::new(1, MAX_GENERATION)]
        );
        assert_eq!(store.create_object(0).unwrap(), Reference::new(2, 0));
    }

    #[test]
    fn test_push_replaces_same_number() {
        let mut store = ObjectStore::new();
        store.push_object(Object::new(Reference::new(5, 0), 1));
        let replaced = store.push_object(Object::new(Reference::new(5, 2), 2)).unwrap();

        assert_eq!(replaced.reference(), Reference::new(5, 0));
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get_object(Reference::new(5, 2)).unwrap().owner(),
            Some(store.id())
        );
        assert_eq!(store.create_object(3).unwrap(), Reference::new(6, 0));
    }

    #[test]
    fn test_add_free_object_from_file() {
        let mut store = ObjectStore::new();
        store.add_free_object(Reference::new(4, 3));
        assert_eq!(store.max_object_number(), 4);
        assert_eq!(store.create_object(0).unwrap(), Reference::new(4, 3));
    }

    #[test]
    fn test_exhausted_number_space() {
        let mut store = ObjectStore::new();
        store.push_object(Object::new(Reference::new(u32::MAX, 0), 1));
        assert_eq!(store.max_object_number(), u32::MAX);

        let error = store.create_object(2).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ValueOutOfRange);
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.create_dictionary_object(None).unwrap_err().kind(),
            ErrorKind::ValueOutOfRange
        );

        // Freed numbers stay usable.
        store.remove_object(Reference::new(u32::MAX, 0));
        assert_eq!(store.create_object(3).unwrap(), Reference::new(u32::MAX, 1));
    }

    #[test]
    fn test_import_past_number_space() {
        let mut store = ObjectStore::new();
        store.push_object(Object::new(Reference::new(u32::MAX - 1, 0), 1));
        let mut other = ObjectStore::new();
        other.create_object(2).unwrap();
        other.create_object(3).unwrap();

        let error = store.import(other).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ValueOutOfRange);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_resolve_one_hop() {
        let mut store = ObjectStore::new();
        let target = store.create_object(Name::new("Target")).unwrap();
        let pointer = Variant::from(target);
        let direct = Variant::from(7);

        assert_eq!(store.resolve(&pointer).unwrap().get_name().unwrap(), "Target");
        assert_eq!(store.resolve(&direct).unwrap().get_number().unwrap(), 7);
        assert!(store.resolve(&Variant::from(Reference::new(40, 0))).is_none());
    }

    #[test]
    fn test_import_offsets_references() {
        let mut store = ObjectStore::new();
        store.create_object(1).unwrap();
        store.create_object(2).unwrap();

        let mut other = ObjectStore::new();
        let leaf = other.create_object(Name::new("Leaf")).unwrap();
        let mut dict = Dictionary::new();
        dict.set("Kids", vec![Variant::from(leaf)]).unwrap();
        let root = other.create_object(dict).unwrap();

        let offset = store.import(other).unwrap();
        assert_eq!(offset, 2);
        assert_eq!(root.offset_by(offset), Some(Reference::new(4, 0)));

        let imported = store.get_object(Reference::new(4, 0)).unwrap();
        assert_eq!(imported.owner(), Some(store.id()));
        let kids = imported.dictionary().unwrap().get("Kids").unwrap().get_array().unwrap();
        assert_eq!(kids.get(0).unwrap().get_reference().unwrap(), Reference::new(3, 0));
        assert_eq!(store.create_object(0).unwrap(), Reference::new(5, 0));
    }

    #[test]
    fn test_offset_references_ignores_immutability() {
        let mut value = Variant::from(vec![Variant::from(Reference::new(1, 0))]);
        value.set_immutable(true);
        offset_references(&mut value, 10).unwrap();
        assert_eq!(
            value.get_array().unwrap().get(0).unwrap().get_reference().unwrap(),
            Reference::new(11, 0)
        );
    }

    #[test]
    fn test_dependencies_with_cycle() {
        let mut store = ObjectStore::new();
        let a = store.create_dictionary_object(None).unwrap();
        let b = store.create_object(vec![Variant::from(a)]).unwrap();
        store
            .get_object_mut(a)
            .unwrap()
            .dictionary_mut()
            .unwrap()
            .set("Next", b)
            .unwrap();

        let deps = store.object_dependencies(&Variant::from(a)).unwrap();
        assert_eq!(deps.into_iter().collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn test_collect_garbage() {
        let mut store = ObjectStore::new();
        let kept = store.create_object(1).unwrap();
        let root = store.create_object(vec![Variant::from(kept)]).unwrap();
        let orphan = store.create_object(2).unwrap();

        let mut trailer = Dictionary::new();
        trailer.set("Root", root).unwrap();
        assert_eq!(store.collect_garbage(&trailer).unwrap(), vec![orphan]);
        assert!(store.contains(kept));
        assert!(!store.contains(orphan));
        assert_eq!(store.free_objects().collect::<Vec<_>>(), vec![Reference::new(3, 1)]);
    }

    #[test]
    fn test_renumber_compacts() {
        let mut store = ObjectStore::new();
        store.push_object(Object::new(Reference::new(7, 2), 1));
        store.push_object(Object::new(
            Reference::new(9, 0),
            vec![Variant::from(Reference::new(7, 2)), Variant::from(Reference::new(8, 0))],
        ));
        let mut trailer = Dictionary::new();
        trailer.set("Root", Reference::new(9, 0)).unwrap();

        store.renumber(&mut trailer).unwrap();
        assert_eq!(store.references().collect::<Vec<_>>(), vec![Reference::new(1, 0), Reference::new(2, 0)]);
        assert_eq!(trailer.get("Root").unwrap().get_reference().unwrap(), Reference::new(2, 0));

        let array = store.get_object(Reference::new(2, 0)).unwrap().variant().get_array().unwrap();
        assert_eq!(array.get(0).unwrap().get_reference().unwrap(), Reference::new(1, 0));
        assert!(array.get(1).unwrap().is_null());
        assert_eq!(store.create_object(0).unwrap(), Reference::new(3, 0));
    }

    #[test]
    fn test_delayed_objects_load_on_demand() {
        let mut store = ObjectStore::new();
        store.push_delayed(Reference::new(1, 0), || -> Result<Variant> { Ok(Variant::from(5)) });

        assert!(!store.get_object(Reference::new(1, 0)).unwrap().variant().is_loaded());
        store.load_all().unwrap();
        let variant = store.get_object(Reference::new(1, 0)).unwrap().variant();
        assert!(variant.is_loaded());
        assert!(!variant.is_dirty());
    }

    #[test]
    fn test_stream_object_uses_default_filters() {
        let mut store = ObjectStore::with_options(
            StoreOptions::default().with_stream_filters(vec![FilterType::AsciiHexDecode]),
        );
        let reference = store.create_stream_object(Dictionary::new(), b"AB").unwrap();
        let stream = store.get_object(reference).unwrap().stream().unwrap();
        assert_eq!(stream.raw_data(), b"4142>");
        assert_eq!(stream.filters(), &[FilterType::AsciiHexDecode]);
    }
}
