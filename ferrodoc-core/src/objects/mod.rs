//! PDF object model
//!
//! Values ([`Variant`]), their containers ([`Array`], [`Dictionary`]),
//! indirect [`Object`]s with optional [`Stream`]s, and the [`ObjectStore`]
//! that owns them.

mod array;
mod container;
mod dictionary;
mod loader;
mod name;
mod object;
pub mod parser;
mod reference;
mod store;
mod stream;
mod string;
mod variant;

pub use array::Array;
pub use container::Container;
pub use dictionary::Dictionary;
pub use loader::{BytesLoader, DelayedLoad, SourceLoader};
pub use name::Name;
pub use object::Object;
pub use parser::{parse_object_body, parse_variant, ParsedObject, Parser, MAX_NESTING_DEPTH};
pub use reference::Reference;
pub use store::{offset_references, ObjectStore, StoreId, StoreOptions, MAX_GENERATION};
pub use stream::Stream;
pub use string::PdfString;
pub use variant::{DataType, LoadState, Variant, VariantData, WriteMode};
