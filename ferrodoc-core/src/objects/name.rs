use std::borrow::{Borrow, Cow};
use std::fmt;

/// A PDF name (`/Type`), stored unescaped as raw bytes.
///
/// Names are byte sequences: `/Caf#E9` keeps its Latin-1 byte and is
/// written back unchanged.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(Vec<u8>);

impl Name {
    pub const TYPE: &'static str = "Type";
    pub const LENGTH: &'static str = "Length";
    pub const FILTER: &'static str = "Filter";

    /// Create a name from its unescaped bytes
    pub fn new(name: impl Into<Vec<u8>>) -> Self {
        Self(name.into())
    }

    /// Decodes `#xx` escape sequences as found in a file.
    pub fn from_escaped(escaped: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(escaped.len());
        let mut i = 0;
        while i < escaped.len() {
            if escaped[i] == b'#' && i + 2 < escaped.len() {
                if let Ok(decoded) = hex::decode(&escaped[i + 1..i + 3]) {
                    bytes.push(decoded[0]);
                    i += 3;
                    continue;
                }
            }
            bytes.push(escaped[i]);
            i += 1;
        }
        Self(bytes)
    }

    /// Unescaped bytes of the name
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Text form, with invalid UTF-8 replaced.
    pub fn to_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    /// Byte form used on the wire, without the leading slash.
    pub fn escaped(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.0.len());
        for &byte in &self.0 {
            if needs_escape(byte) {
                out.push(b'#');
                out.extend_from_slice(hex::encode_upper([byte]).as_bytes());
            } else {
                out.push(byte);
            }
        }
        out
    }
}

fn needs_escape(byte: u8) -> bool {
    !(33..=126).contains(&byte)
        || matches!(
            byte,
            b'#' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
        )
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", String::from_utf8_lossy(&self.escaped()))
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Name").field(&self.to_string()).finish()
    }
}

impl Borrow<[u8]> for Name {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Name {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Name {
    fn from(name: String) -> Self {
        Self(name.into_bytes())
    }
}

impl From<&[u8]> for Name {
    fn from(name: &[u8]) -> Self {
        Self::new(name)
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}
