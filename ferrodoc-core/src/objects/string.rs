use std::fmt;

const UTF16_BOM: [u8; 2] = [0xFE, 0xFF];

/// A PDF string: raw bytes plus the literal/hex choice used when writing.
///
/// Ordering and equality consider the bytes only, so `(A)` and `<41>` are the
/// same key in a name tree.
#[derive(Debug, Clone, Default)]
pub struct PdfString {
    bytes: Vec<u8>,
    hex: bool,
}

impl PdfString {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            hex: false,
        }
    }

    pub fn hex(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            hex: true,
        }
    }

    /// Encodes text as Latin-1 when possible, otherwise as UTF-16BE with a BOM.
    pub fn from_text(text: &str) -> Self {
        if text.chars().all(|c| (c as u32) < 0x80 || ((c as u32) >= 0xA0 && (c as u32) <= 0xFF)) {
            return Self::new(text.chars().map(|c| c as u8).collect::<Vec<u8>>());
        }

        let mut bytes = UTF16_BOM.to_vec();
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Self::new(bytes)
    }

    pub fn is_hex(&self) -> bool {
        self.hex
    }

    pub fn is_unicode(&self) -> bool {
        self.bytes.starts_with(&UTF16_BOM)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decodes UTF-16BE (with BOM) or Latin-1 bytes to text.
    pub fn to_text(&self) -> String {
        if self.is_unicode() {
            let units: Vec<u16> = self.bytes[2..]
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            return String::from_utf16_lossy(&units);
        }
        self.bytes.iter().map(|&b| b as char).collect()
    }

    /// Wire form including delimiters: `(escaped)` or `<HEX>`.
    pub(crate) fn encode(bytes: &[u8], hex: bool) -> Vec<u8> {
        if hex {
            let mut out = Vec::with_capacity(bytes.len() * 2 + 2);
            out.push(b'<');
            out.extend_from_slice(hex::encode_upper(bytes).as_bytes());
            out.push(b'>');
            return out;
        }

        let mut out = Vec::with_capacity(bytes.len() + 2);
        out.push(b'(');
        for &byte in bytes {
            match byte {
                b'\n' => out.extend_from_slice(b"\\n"),
                b'\r' => out.extend_from_slice(b"\\r"),
                b'\t' => out.extend_from_slice(b"\\t"),
                0x08 => out.extend_from_slice(b"\\b"),
                0x0C => out.extend_from_slice(b"\\f"),
                b'(' | b')' | b'\\' => {
                    out.push(b'\\');
                    out.push(byte);
                }
                _ => out.push(byte),
            }
        }
        out.push(b')');
        out
    }
}

impl PartialEq for PdfString {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for PdfString {}

impl PartialOrd for PdfString {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PdfString {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.bytes.cmp(&other.bytes)
    }
}

impl std::hash::Hash for PdfString {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Display for PdfString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&Self::encode(&self.bytes, self.hex)))
    }
}

impl From<&str> for PdfString {
    fn from(text: &str) -> Self {
        Self::new(text.as_bytes())
    }
}

impl From<String> for PdfString {
    fn from(text: String) -> Self {
        Self::new(text.into_bytes())
    }
}
