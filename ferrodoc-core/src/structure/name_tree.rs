//! Name tree structure according to ISO 32000-1 Section 7.9.6
//!
//! Nodes are ordinary dictionary objects in an [`ObjectStore`]: leaves hold a
//! sorted `/Names` array of key/value pairs, intermediate nodes a `/Kids`
//! array of references, and every node below the root advertises its key
//! span in `/Limits`. Insertion keeps the tree balanced by splitting nodes
//! that outgrow the fan-out, B-tree style.
//!
//! The root never carries `/Limits`, as ISO 32000-1 Table 36 requires, so
//! when the root itself splits it stays in place and becomes the parent of
//! both halves instead of being replaced by a new root with a spanning
//! `/Limits` entry. References to the root (from `/Names` or the catalog)
//! therefore stay valid, and [`NameTree::limits`] computes the span of the
//! whole tree on demand.

use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, ObjectStore, PdfString, Reference, Variant};
use tracing::{debug, warn};

/// Maximum number of kids of an intermediate node. Leaves hold as many
/// key/value pairs.
pub const BALANCE_TREE_MAX: usize = 65;

/// Nominal size of a node right after a split.
pub const BALANCE_TREE_MIN: usize = (BALANCE_TREE_MAX + 2) / 2;

const KIDS: &str = "Kids";
const NAMES: &str = "Names";
const LIMITS: &str = "Limits";

/// Nesting bound for walking trees read from foreign files.
const MAX_TREE_DEPTH: usize = 64;

/// Position of a key relative to a node's `/Limits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitsCheck {
    Before,
    Inside,
    After,
}

/// Classifies `key` against the `/Limits` of `node`. A node without usable
/// `/Limits` claims every key.
pub fn check_limits(node: &Dictionary, key: &PdfString) -> LimitsCheck {
    match node_limits(node) {
        Some((low, _)) if key < &low => LimitsCheck::Before,
        Some((_, high)) if key > &high => LimitsCheck::After,
        _ => LimitsCheck::Inside,
    }
}

fn node_limits(node: &Dictionary) -> Option<(PdfString, PdfString)> {
    let limits = node.get(LIMITS)?.get_array().ok()?;
    let low = limits.get(0)?.get_string().ok()?;
    let high = limits.get(1)?.get_string().ok()?;
    Some((low.clone(), high.clone()))
}

fn node(store: &ObjectStore, reference: Reference) -> Result<&Dictionary> {
    store
        .get_object(reference)
        .ok_or_else(|| PdfError::InvalidHandle(format!("name tree node {reference} not found")))?
        .dictionary()
}

fn node_mut(store: &mut ObjectStore, reference: Reference) -> Result<&mut Dictionary> {
    store
        .get_object_mut(reference)
        .ok_or_else(|| PdfError::InvalidHandle(format!("name tree node {reference} not found")))?
        .dictionary_mut()
}

fn kids_of(node: &Dictionary) -> Result<Vec<Reference>> {
    match node.get(KIDS) {
        Some(kids) => kids.get_array()?.iter().map(Variant::get_reference).collect(),
        None => Ok(Vec::new()),
    }
}

/// Inserts into a sorted `/Names` array, replacing the value of an existing
/// key.
fn insert_into_leaf(leaf: &mut Dictionary, key: PdfString, value: Variant) -> Result<()> {
    let names = leaf
        .get_mut(NAMES)?
        .ok_or_else(|| PdfError::InvalidKey(NAMES.to_string()))?
        .get_array_mut()?;
    if names.len() % 2 != 0 {
        return Err(PdfError::InvalidDataType(format!(
            "/Names array of odd length {}",
            names.len()
        )));
    }

    let mut index = names.len();
    for i in (0..names.len()).step_by(2) {
        let existing = names
            .get(i)
            .ok_or_else(|| PdfError::InternalLogic("name tree pair out of bounds".to_string()))?
            .get_string()?;
        match key.cmp(existing) {
            std::cmp::Ordering::Equal => return names.set(i + 1, value),
            std::cmp::Ordering::Less => {
                index = i;
                break;
            }
            std::cmp::Ordering::Greater => {}
        }
    }
    names.insert(index, key)?;
    names.insert(index + 1, value)
}

/// Span of the keys below `reference`: from the `/Names` of a leaf, or from
/// the first and last kid of an intermediate node.
fn compute_limits(
    store: &ObjectStore,
    reference: Reference,
    depth: usize,
) -> Result<Option<(PdfString, PdfString)>> {
    if depth > MAX_TREE_DEPTH {
        return Err(PdfError::InternalLogic(format!(
            "name tree deeper than {MAX_TREE_DEPTH} levels at {reference}"
        )));
    }
    let dict = node(store, reference)?;

    if dict.contains_key(KIDS) {
        let kids = kids_of(dict)?;
        let (Some(&first), Some(&last)) = (kids.first(), kids.last()) else {
            return Ok(None);
        };
        let kid_limits = |kid: Reference| -> Result<Option<(PdfString, PdfString)>> {
            match node_limits(node(store, kid)?) {
                Some(limits) => Ok(Some(limits)),
                None => compute_limits(store, kid, depth + 1),
            }
        };
        let low = kid_limits(first)?.map(|(low, _)| low);
        let high = kid_limits(last)?.map(|(_, high)| high);
        return Ok(low.zip(high));
    }

    let Some(names) = dict.get(NAMES) else {
        return Ok(None);
    };
    let names = names.get_array()?;
    if names.len() < 2 {
        return Ok(None);
    }
    let low = names.get(0).map(Variant::get_string).transpose()?;
    let high = names.get(names.len() - 2).map(Variant::get_string).transpose()?;
    Ok(low.cloned().zip(high.cloned()))
}

/// Handle to a name tree whose root dictionary lives in an [`ObjectStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameTree {
    root: Reference,
    fan_out: usize,
}

impl NameTree {
    /// Creates an empty root dictionary in `store`.
    pub fn create(store: &mut ObjectStore) -> Result<Self> {
        Ok(Self::open(store.create_dictionary_object(None)?))
    }

    /// Wraps an existing root node.
    pub fn open(root: Reference) -> Self {
        Self {
            root,
            fan_out: BALANCE_TREE_MAX,
        }
    }

    /// Overrides [`BALANCE_TREE_MAX`]; values below 2 are raised to 2.
    pub fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = fan_out.max(2);
        self
    }

    pub fn root(&self) -> Reference {
        self.root
    }

    pub fn fan_out(&self) -> usize {
        self.fan_out
    }

    /// Associates `value` with `key`, replacing any previous value.
    pub fn add_value(
        &self,
        store: &mut ObjectStore,
        key: impl Into<PdfString>,
        value: impl Into<Variant>,
    ) -> Result<()> {
        self.add_to_node(store, self.root, None, key.into(), value.into())
    }

    fn add_to_node(
        &self,
        store: &mut ObjectStore,
        reference: Reference,
        parent: Option<Reference>,
        key: PdfString,
        value: Variant,
    ) -> Result<()> {
        let dict = node(store, reference)?;

        if dict.contains_key(KIDS) {
            let kids = kids_of(dict)?;
            let Some(&last) = kids.last() else {
                return Err(PdfError::InternalLogic(format!(
                    "name tree node {reference} has an empty /Kids"
                )));
            };

            let mut target = (last, LimitsCheck::After);
            for kid in kids {
                let check = check_limits(node(store, kid)?, &key);
                if check != LimitsCheck::After {
                    target = (kid, check);
                    break;
                }
            }

            let (child, check) = target;
            self.add_to_node(store, child, Some(reference), key, value)?;
            if check != LimitsCheck::Inside {
                self.set_limits(store, reference, parent)?;
            }
            self.rebalance(store, reference, parent)
        } else if dict.contains_key(NAMES) {
            insert_into_leaf(node_mut(store, reference)?, key, value)?;
            self.set_limits(store, reference, parent)?;
            self.rebalance(store, reference, parent)
        } else {
            let mut leaf = Dictionary::new();
            leaf.set(LIMITS, vec![Variant::from(key.clone()), Variant::from(key.clone())])?;
            leaf.set(NAMES, vec![Variant::from(key), value])?;
            let leaf = store.create_object(leaf)?;

            node_mut(store, reference)?.set(KIDS, vec![Variant::from(leaf)])?;
            self.set_limits(store, reference, parent)
        }
    }

    /// Rewrites `/Limits` of a node below the root.
    fn set_limits(
        &self,
        store: &mut ObjectStore,
        reference: Reference,
        parent: Option<Reference>,
    ) -> Result<()> {
        if parent.is_none() {
            return Ok(());
        }
        if let Some((low, high)) = compute_limits(store, reference, 0)? {
            node_mut(store, reference)?
                .set(LIMITS, vec![Variant::from(low), Variant::from(high)])?;
        }
        Ok(())
    }

    /// Splits the node in two when its `/Kids` or `/Names` array is over
    /// capacity. The second half moves to a new sibling right after the node
    /// in the parent; a root keeps its identity and receives both halves as
    /// new kids.
    fn rebalance(
        &self,
        store: &mut ObjectStore,
        reference: Reference,
        parent: Option<Reference>,
    ) -> Result<()> {
        let dict = node(store, reference)?;
        let (key, capacity) = if dict.contains_key(KIDS) {
            (KIDS, self.fan_out)
        } else {
            (NAMES, self.fan_out * 2)
        };
        let Some(items) = dict.get(key) else {
            return Ok(());
        };
        let items = items.get_array()?.as_slice();
        if items.len() <= capacity {
            return Ok(());
        }

        let split = if key == NAMES {
            (items.len() / 2 + 1) / 2 * 2
        } else {
            (items.len() + 1) / 2
        };
        let first = items[..split].to_vec();
        let second = items[split..].to_vec();
        debug!(
            "Splitting name tree node {} ({} {} entries)",
            reference,
            items.len(),
            key
        );

        let mut sibling = Dictionary::new();
        sibling.set(key, second)?;
        let sibling = store.create_object(sibling)?;

        match parent {
            None => {
                let mut child = Dictionary::new();
                child.set(key, first)?;
                let child = store.create_object(child)?;

                let root = node_mut(store, reference)?;
                root.remove(NAMES)?;
                root.set(KIDS, vec![Variant::from(child), Variant::from(sibling)])?;
                self.set_limits(store, child, Some(reference))?;
                self.set_limits(store, sibling, Some(reference))
            }
            Some(parent) => {
                node_mut(store, reference)?.set(key, first)?;

                let kids = node_mut(store, parent)?
                    .get_mut(KIDS)?
                    .ok_or_else(|| PdfError::InvalidKey(KIDS.to_string()))?
                    .get_array_mut()?;
                let position = kids
                    .iter()
                    .position(|kid| kid.get_reference().ok() == Some(reference))
                    .ok_or_else(|| {
                        PdfError::InternalLogic(format!(
                            "node {reference} missing from /Kids of {parent}"
                        ))
                    })?;
                kids.insert(position + 1, sibling)?;

                self.set_limits(store, reference, Some(parent))?;
                self.set_limits(store, sibling, Some(parent))
            }
        }
    }

    /// Value stored under `key`. A reference value is resolved one hop.
    ///
    /// Unreadable parts of the tree are skipped, so a damaged tree yields
    /// `None` rather than an error.
    pub fn get_value<'a>(&self, store: &'a ObjectStore, key: &PdfString) -> Option<&'a Variant> {
        match node(store, self.root) {
            Ok(root) => lookup(store, root, key, 0),
            Err(e) => {
                debug!("Name tree root {} unreadable: {}", self.root, e);
                None
            }
        }
    }

    pub fn has_value(&self, store: &ObjectStore, key: &PdfString) -> bool {
        self.get_value(store, key).is_some()
    }

    /// Key span of the whole tree. The root itself does not carry
    /// `/Limits`.
    pub fn limits(&self, store: &ObjectStore) -> Option<(PdfString, PdfString)> {
        compute_limits(store, self.root, 0).ok().flatten()
    }

    /// Every key/value pair in key order. Values are not resolved.
    pub fn entries<'a>(&self, store: &'a ObjectStore) -> Vec<(&'a PdfString, &'a Variant)> {
        let mut entries = Vec::new();
        collect_entries(store, self.root, 0, &mut entries);
        entries
    }
}

fn lookup<'a>(
    store: &'a ObjectStore,
    dict: &'a Dictionary,
    key: &PdfString,
    depth: usize,
) -> Option<&'a Variant> {
    if depth > MAX_TREE_DEPTH {
        warn!("Name tree deeper than {} levels, giving up", MAX_TREE_DEPTH);
        return None;
    }
    if depth > 0 && !dict.contains_key(LIMITS) {
        debug!("Name tree node without /Limits, scanning it");
    }
    if check_limits(dict, key) != LimitsCheck::Inside {
        return None;
    }

    if let Some(kids) = dict.get(KIDS) {
        let kids = kids.get_array().ok()?;
        for kid in kids {
            let child = kid
                .get_reference()
                .ok()
                .and_then(|reference| node(store, reference).ok());
            match child {
                Some(child) => {
                    if let Some(found) = lookup(store, child, key, depth + 1) {
                        return Some(found);
                    }
                }
                None => debug!("Name tree child {:?} cannot be resolved", kid),
            }
        }
        return None;
    }

    let names = dict.get(NAMES)?.get_array().ok()?;
    names
        .as_slice()
        .chunks_exact(2)
        .find(|pair| pair[0].get_string().ok() == Some(key))
        .and_then(|pair| store.resolve(&pair[1]))
}

fn collect_entries<'a>(
    store: &'a ObjectStore,
    reference: Reference,
    depth: usize,
    entries: &mut Vec<(&'a PdfString, &'a Variant)>,
) {
    if depth > MAX_TREE_DEPTH {
        warn!("Name tree deeper than {} levels, giving up", MAX_TREE_DEPTH);
        return;
    }
    let dict = match node(store, reference) {
        Ok(dict) => dict,
        Err(e) => {
            debug!("Name tree node {} skipped: {}", reference, e);
            return;
        }
    };

    if let Some(kids) = dict.get(KIDS).and_then(|kids| kids.get_array().ok()) {
        for kid in kids {
            match kid.get_reference() {
                Ok(kid) => collect_entries(store, kid, depth + 1, entries),
                Err(_) => debug!("Name tree kid {:?} is not a reference", kid),
            }
        }
    } else if let Some(names) = dict.get(NAMES).and_then(|names| names.get_array().ok()) {
        for pair in names.as_slice().chunks_exact(2) {
            match pair[0].get_string() {
                Ok(key) => entries.push((key, &pair[1])),
                Err(_) => debug!("Name tree key {:?} is not a string", pair[0]),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(text: &str) -> PdfString {
        PdfString::from(text)
    }

    /// Walks the tree checking key order and `/Limits`; returns leaf depths.
    fn check_node(
        store: &ObjectStore,
        reference: Reference,
        depth: usize,
        is_root: bool,
        leaf_depths: &mut Vec<usize>,
    ) -> Option<(PdfString, PdfString)> {
        let dict = node(store, reference).unwrap();
        let span = if dict.contains_key(KIDS) {
            let kids = kids_of(dict).unwrap();
            let spans: Vec<_> = kids
                .iter()
                .map(|kid| check_node(store, *kid, depth + 1, false, leaf_depths).unwrap())
                .collect();
            for pair in spans.windows(2) {
                assert!(pair[0].1 < pair[1].0, "siblings out of order");
            }
            Some((spans[0].0.clone(), spans[spans.len() - 1].1.clone()))
        } else {
            leaf_depths.push(depth);
            let names = dict.get(NAMES).unwrap().get_array().unwrap();
            let keys: Vec<_> = names
                .iter()
                .step_by(2)
                .map(|k| k.get_string().unwrap().clone())
                .collect();
            assert!(keys.windows(2).all(|w| w[0] < w[1]), "leaf keys unsorted");
            Some((keys[0].clone(), keys[keys.len() - 1].clone()))
        };

        if is_root {
            assert!(!dict.contains_key(LIMITS), "root must not carry /Limits");
        } else {
            assert_eq!(node_limits(dict), span, "stale /Limits on {reference}");
        }
        span
    }

    fn check_tree(store: &ObjectStore, tree: &NameTree) {
        let mut depths = Vec::new();
        check_node(store, tree.root(), 0, true, &mut depths);
        assert!(depths.windows(2).all(|w| w[0] == w[1]), "unbalanced: {depths:?}");
    }

    #[test]
    fn test_first_insert_creates_leaf_under_root() {
        let mut store = ObjectStore::new();
        let tree = NameTree::create(&mut store).unwrap();
        tree.add_value(&mut store, "Intro", 1).unwrap();

        let root = node(&store, tree.root()).unwrap();
        let kids = kids_of(root).unwrap();
        assert_eq!(kids.len(), 1);
        assert!(!root.contains_key(NAMES));
        let leaf = node(&store, kids[0]).unwrap();
        assert_eq!(node_limits(leaf), Some((key("Intro"), key("Intro"))));
        assert_eq!(tree.get_value(&store, &key("Intro")).unwrap().get_number().unwrap(), 1);
    }

    #[test]
    fn test_overwrite_existing_key() {
        let mut store = ObjectStore::new();
        let tree = NameTree::create(&mut store).unwrap();
        tree.add_value(&mut store, "K", 1).unwrap();
        tree.add_value(&mut store, "K", 2).unwrap();

        assert_eq!(tree.entries(&store).len(), 1);
        assert_eq!(tree.get_value(&store, &key("K")).unwrap().get_number().unwrap(), 2);
    }

    #[test]
    fn test_limits_follow_inserts_before_and_after() {
        let mut store = ObjectStore::new();
        let tree = NameTree::create(&mut store).unwrap();
        for name in ["M", "A", "Z", "Q"] {
            tree.add_value(&mut store, name, 0).unwrap();
        }
        assert_eq!(tree.limits(&store), Some((key("A"), key("Z"))));
        let keys: Vec<_> = tree.entries(&store).into_iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![key("A"), key("M"), key("Q"), key("Z")]);
        check_tree(&store, &tree);
    }

    #[test]
    fn test_single_split_at_capacity() {
        let mut store = ObjectStore::new();
        let tree = NameTree::create(&mut store).unwrap();
        for i in 0..=BALANCE_TREE_MAX {
            tree.add_value(&mut store, format!("K{i:03}"), i as i64).unwrap();
        }

        let root = node(&store, tree.root()).unwrap();
        let kids = kids_of(root).unwrap();
        assert_eq!(kids.len(), 2);
        assert_eq!(store.len(), 3);
        for kid in &kids {
            let leaf = node(&store, *kid).unwrap();
            assert_eq!(leaf.get(NAMES).unwrap().get_array().unwrap().len(), 2 * BALANCE_TREE_MIN);
        }
        assert_eq!(
            tree.limits(&store),
            Some((key("K000"), key(&format!("K{BALANCE_TREE_MAX:03}"))))
        );
        check_tree(&store, &tree);
    }

    #[test]
    fn test_small_fan_out_grows_levels() {
        let mut store = ObjectStore::new();
        let tree = NameTree::create(&mut store).unwrap().with_fan_out(2);
        for i in (0..60).rev() {
            tree.add_value(&mut store, format!("{i:02}"), i).unwrap();
        }
        check_tree(&store, &tree);
        for i in 0..60 {
            let value = tree.get_value(&store, &key(&format!("{i:02}"))).unwrap();
            assert_eq!(value.get_number().unwrap(), i64::from(i));
        }
        assert!(!tree.has_value(&store, &key("60")));
    }

    #[test]
    fn test_foreign_leaf_root_is_split_in_place() {
        let mut store = ObjectStore::new();
        let mut root = Dictionary::new();
        root.set(NAMES, vec![Variant::from("a"), Variant::from(1), Variant::from("b"), Variant::from(2)])
            .unwrap();
        let tree = NameTree::open(store.create_object(root).unwrap()).with_fan_out(2);

        tree.add_value(&mut store, "c", 3).unwrap();
        let root = node(&store, tree.root()).unwrap();
        assert!(!root.contains_key(NAMES));
        assert_eq!(kids_of(root).unwrap().len(), 2);
        check_tree(&store, &tree);
    }

    #[test]
    fn test_lookup_tolerates_damaged_nodes() {
        let mut store = ObjectStore::new();
        let mut leaf = Dictionary::new();
        leaf.set(NAMES, vec![Variant::from("x"), Variant::from(9)]).unwrap();
        let leaf = store.create_object(leaf).unwrap();
        let mut root = Dictionary::new();
        root.set(KIDS, vec![Variant::from(Reference::new(77, 0)), Variant::from(leaf)])
            .unwrap();
        let tree = NameTree::open(store.create_object(root).unwrap());

        assert_eq!(tree.get_value(&store, &key("x")).unwrap().get_number().unwrap(), 9);
        assert!(tree.get_value(&store, &key("y")).is_none());
        assert_eq!(tree.entries(&store).len(), 1);
    }

    #[test]
    fn test_reference_values_resolve() {
        let mut store = ObjectStore::new();
        let target = store.create_object(Variant::from("payload")).unwrap();
        let tree = NameTree::create(&mut store).unwrap();
        tree.add_value(&mut store, "doc", target).unwrap();

        let value = tree.get_value(&store, &key("doc")).unwrap();
        assert_eq!(value.get_string().unwrap(), &key("payload"));
    }

    #[test]
    fn test_check_limits() {
        let mut dict = Dictionary::new();
        assert_eq!(check_limits(&dict, &key("any")), LimitsCheck::Inside);
        dict.set(LIMITS, vec![Variant::from("c"), Variant::from("f")]).unwrap();
        assert_eq!(check_limits(&dict, &key("a")), LimitsCheck::Before);
        assert_eq!(check_limits(&dict, &key("c")), LimitsCheck::Inside);
        assert_eq!(check_limits(&dict, &key("f")), LimitsCheck::Inside);
        assert_eq!(check_limits(&dict, &key("g")), LimitsCheck::After);
    }
}
