//! # ferrodoc
//!
//! The indirect object graph underneath a PDF writer: tagged values, an
//! object store with free-list management, output devices that serialize
//! objects byte-exactly, and balanced name trees stored as ordinary
//! objects.
//!
//! ## Features
//!
//! - **Variants**: null, booleans, integers, reals, strings, names,
//!   references, arrays, dictionaries and raw data, with dirty and
//!   immutability tracking and delayed loading
//! - **Object store**: object number allocation and reuse, garbage
//!   collection, renumbering and store merging
//! - **Output devices**: memory, fixed-buffer, file and counting sinks with
//!   an optional single-writer stack for interleaved stream output
//! - **Name trees**: B-tree style balanced insertion with `/Limits`
//!   maintenance (ISO 32000-1 Section 7.9.6)
//! - **Writer**: complete files with a classic cross-reference table
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrodoc::objects::{Dictionary, ObjectStore, PdfString};
//! use ferrodoc::structure::{KnownTree, NamesDictionary};
//! use ferrodoc::{OutputDevice, PdfWriter, Result, WriterConfig};
//!
//! # fn main() -> Result<()> {
//! let mut store = ObjectStore::new();
//! let catalog = store.create_dictionary_object(Some("Catalog"))?;
//!
//! let names = NamesDictionary::from_catalog(&mut store, catalog)?;
//! names.add_value(&mut store, KnownTree::Dests, "Intro", 1)?;
//! assert!(names.has_value(&store, KnownTree::Dests, &PdfString::from("Intro")));
//!
//! let mut trailer = Dictionary::new();
//! trailer.set("Root", catalog)?;
//!
//! let mut writer = PdfWriter::with_config(OutputDevice::memory(), WriterConfig::default());
//! writer.write_document(&mut store, &trailer)?;
//! let bytes = writer.into_device().into_bytes().unwrap_or_default();
//! assert!(bytes.starts_with(b"%PDF-1.7"));
//! # Ok(())
//! # }
//! ```

pub mod device;
pub mod encrypt;
pub mod error;
pub mod filters;
pub mod objects;
pub mod structure;
pub mod writer;

pub use device::{DeviceStream, OutputDevice, WriterId};
pub use encrypt::{Encrypt, EncryptContext};
pub use error::{ErrorKind, PdfError, Result};
pub use filters::{FilterChain, FilterType};
pub use objects::{
    Array, Container, Dictionary, Name, Object, ObjectStore, PdfString, Reference, Stream,
    Variant, WriteMode,
};
pub use structure::{KnownTree, NameTree, NamesDictionary};
pub use writer::{PdfVersion, PdfWriter, WriterConfig};

/// Current version of ferrodoc
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
