//! Document name dictionary according to ISO 32000-1 Section 7.7.4
//!
//! The catalog's `/Names` entry maps each [`KnownTree`] to the root of a
//! [`NameTree`]. Trees are created lazily on first insertion.

use super::name_tree::NameTree;
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Name, ObjectStore, PdfString, Reference, Variant};
use std::fmt;

/// Name trees a names dictionary may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownTree {
    Dests,
    AP,
    JavaScript,
    Pages,
    Templates,
    IDS,
    URLS,
    EmbeddedFiles,
    AlternatePresentations,
    Renditions,
}

impl KnownTree {
    pub const ALL: [KnownTree; 10] = [
        KnownTree::Dests,
        KnownTree::AP,
        KnownTree::JavaScript,
        KnownTree::Pages,
        KnownTree::Templates,
        KnownTree::IDS,
        KnownTree::URLS,
        KnownTree::EmbeddedFiles,
        KnownTree::AlternatePresentations,
        KnownTree::Renditions,
    ];

    /// Key of the tree in the names dictionary.
    pub fn key(&self) -> &'static str {
        match self {
            KnownTree::Dests => "Dests",
            KnownTree::AP => "AP",
            KnownTree::JavaScript => "JavaScript",
            KnownTree::Pages => "Pages",
            KnownTree::Templates => "Templates",
            KnownTree::IDS => "IDS",
            KnownTree::URLS => "URLS",
            KnownTree::EmbeddedFiles => "EmbeddedFiles",
            KnownTree::AlternatePresentations => "AlternatePresentations",
            KnownTree::Renditions => "Renditions",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tree| tree.key() == key)
    }
}

impl fmt::Display for KnownTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.key())
    }
}

/// Handle to a names dictionary object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamesDictionary {
    reference: Reference,
}

impl NamesDictionary {
    /// Creates an empty names dictionary object in `store`.
    pub fn create(store: &mut ObjectStore) -> Result<Self> {
        Ok(Self::open(store.create_dictionary_object(None)?))
    }

    pub fn open(reference: Reference) -> Self {
        Self { reference }
    }

    /// Opens the `/Names` entry of `catalog`, creating and linking a new
    /// names dictionary when the catalog has none.
    pub fn from_catalog(store: &mut ObjectStore, catalog: Reference) -> Result<Self> {
        let existing = catalog_dictionary(store, catalog)?
            .get("Names")
            .map(Variant::get_reference)
            .transpose()?;
        if let Some(reference) = existing {
            return Ok(Self::open(reference));
        }

        let names = Self::create(store)?;
        store
            .get_object_mut(catalog)
            .ok_or_else(|| PdfError::InvalidHandle(format!("catalog {catalog} not found")))?
            .dictionary_mut()?
            .set("Names", names.reference)?;
        Ok(names)
    }

    pub fn reference(&self) -> Reference {
        self.reference
    }

    fn dictionary<'a>(&self, store: &'a ObjectStore) -> Result<&'a Dictionary> {
        store
            .get_object(self.reference)
            .ok_or_else(|| {
                PdfError::InvalidHandle(format!("names dictionary {} not found", self.reference))
            })?
            .dictionary()
    }

    fn find_tree(&self, store: &ObjectStore, kind: KnownTree) -> Result<Option<NameTree>> {
        match self.dictionary(store)?.get(kind.key()) {
            None => Ok(None),
            Some(entry) if entry.is_reference() => Ok(Some(NameTree::open(entry.get_reference()?))),
            Some(entry) => Err(PdfError::InvalidDataType(format!(
                "{kind} must be an indirect reference, found {}",
                entry.data_type()?
            ))),
        }
    }

    /// The tree stored under `kind`. With `create`, a missing tree is
    /// created and linked into the names dictionary.
    pub fn tree(
        &self,
        store: &mut ObjectStore,
        kind: KnownTree,
        create: bool,
    ) -> Result<Option<NameTree>> {
        if let Some(tree) = self.find_tree(store, kind)? {
            return Ok(Some(tree));
        }
        if !create {
            return Ok(None);
        }

        let tree = NameTree::create(store)?;
        store
            .get_object_mut(self.reference)
            .ok_or_else(|| {
                PdfError::InvalidHandle(format!("names dictionary {} not found", self.reference))
            })?
            .dictionary_mut()?
            .set(kind.key(), tree.root())?;
        Ok(Some(tree))
    }

    pub fn add_value(
        &self,
        store: &mut ObjectStore,
        kind: KnownTree,
        key: impl Into<PdfString>,
        value: impl Into<Variant>,
    ) -> Result<()> {
        let tree = self
            .tree(store, kind, true)?
            .ok_or_else(|| PdfError::InternalLogic(format!("{kind} tree was not created")))?;
        tree.add_value(store, key, value)
    }

    /// Looks `key` up in the `kind` tree; `None` when either is missing.
    pub fn get_value<'a>(
        &self,
        store: &'a ObjectStore,
        kind: KnownTree,
        key: &PdfString,
    ) -> Option<&'a Variant> {
        self.find_tree(store, kind)
            .ok()
            .flatten()
            .and_then(|tree| tree.get_value(store, key))
    }

    pub fn has_value(&self, store: &ObjectStore, kind: KnownTree, key: &PdfString) -> bool {
        self.get_value(store, kind, key).is_some()
    }

    /// Flattens the `kind` tree into a dictionary keyed by the decoded
    /// text of each key. Values are copied as stored.
    pub fn to_dictionary(&self, store: &ObjectStore, kind: KnownTree) -> Result<Dictionary> {
        let mut flat = Dictionary::new();
        if let Some(tree) = self.find_tree(store, kind)? {
            for (key, value) in tree.entries(store) {
                flat.set(Name::new(key.to_text()), value.clone())?;
            }
        }
        Ok(flat)
    }
}

fn catalog_dictionary(store: &ObjectStore, catalog: Reference) -> Result<&Dictionary> {
    store
        .get_object(catalog)
        .ok_or_else(|| PdfError::InvalidHandle(format!("catalog {catalog} not found")))?
        .dictionary()
}
