//! Encryption hook
//!
//! The crate does not implement any cipher. Writers accept an [`Encrypt`]
//! implementation and pass string and stream bytes through it, bound to the
//! reference of the object being written.

use crate::error::Result;
use crate::objects::Reference;

pub trait Encrypt {
    /// Encrypts `data` belonging to the object identified by `reference`.
    fn encrypt(&self, reference: Reference, data: &[u8]) -> Result<Vec<u8>>;

    /// Length of a stream body of `length` plain bytes once encrypted.
    fn calculate_stream_length(&self, length: usize) -> usize {
        length
    }
}

/// An [`Encrypt`] bound to the object currently being written.
#[derive(Clone, Copy)]
pub struct EncryptContext<'e> {
    encrypt: &'e dyn Encrypt,
    reference: Reference,
}

impl<'e> EncryptContext<'e> {
    pub fn new(encrypt: &'e dyn Encrypt, reference: Reference) -> Self {
        Self { encrypt, reference }
    }

    pub fn reference(&self) -> Reference {
        self.reference
    }

    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.encrypt.encrypt(self.reference, data)
    }

    pub fn calculate_stream_length(&self, length: usize) -> usize {
        self.encrypt.calculate_stream_length(length)
    }
}

impl std::fmt::Debug for EncryptContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptContext")
            .field("reference", &self.reference)
            .finish_non_exhaustive()
    }
}
