//! Stream filters
//!
//! Encoding runs incrementally so a stream can be appended in chunks, either
//! into memory or straight onto an output device.

use crate::error::{PdfError, Result};
use crate::objects::{Name, Variant};

/// Filters understood by this crate, named as in a `/Filter` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterType {
    FlateDecode,
    AsciiHexDecode,
}

impl FilterType {
    pub fn name(&self) -> &'static str {
        match self {
            FilterType::FlateDecode => "FlateDecode",
            FilterType::AsciiHexDecode => "ASCIIHexDecode",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "FlateDecode" | "Fl" => Ok(FilterType::FlateDecode),
            "ASCIIHexDecode" | "AHx" => Ok(FilterType::AsciiHexDecode),
            other => Err(PdfError::NotImplemented(format!("filter {other}"))),
        }
    }

    fn encoder(&self) -> Result<Box<dyn FilterEncoder>> {
        match self {
            FilterType::FlateDecode => flate_encoder(),
            FilterType::AsciiHexDecode => Ok(Box::new(AsciiHexEncoder)),
        }
    }

    /// Decodes a complete buffer.
    pub fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            FilterType::FlateDecode => flate_decode(data),
            FilterType::AsciiHexDecode => ascii_hex_decode(data),
        }
    }
}

/// `/Filter` value for a list of filters: a single name or an array of names.
pub fn filter_entry(filters: &[FilterType]) -> Option<Variant> {
    match filters {
        [] => None,
        [single] => Some(Variant::from(Name::new(single.name()))),
        many => Some(Variant::from(
            many.iter()
                .map(|f| Variant::from(Name::new(f.name())))
                .collect::<Vec<_>>(),
        )),
    }
}

/// One stage of an encoding pipeline.
pub trait FilterEncoder {
    fn encode_chunk(&mut self, data: &[u8]) -> Result<Vec<u8>>;
    fn finish(&mut self) -> Result<Vec<u8>>;
}

/// Encoders for a `/Filter` list. Decode order is the listed order, so the
/// chain encodes with the last filter first.
pub struct FilterChain {
    encoders: Vec<Box<dyn FilterEncoder>>,
}

impl FilterChain {
    pub fn new(filters: &[FilterType]) -> Result<Self> {
        let encoders = filters
            .iter()
            .rev()
            .map(FilterType::encoder)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { encoders })
    }

    pub fn is_passthrough(&self) -> bool {
        self.encoders.is_empty()
    }

    pub fn encode_chunk(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let mut buffer = data.to_vec();
        for encoder in &mut self.encoders {
            buffer = encoder.encode_chunk(&buffer)?;
        }
        Ok(buffer)
    }

    /// Flushes every stage; trailing output of a stage still passes through
    /// the stages after it.
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for i in 0..self.encoders.len() {
            let mut tail = self.encoders[i].finish()?;
            for encoder in &mut self.encoders[i + 1..] {
                tail = encoder.encode_chunk(&tail)?;
            }
            out.extend_from_slice(&tail);
        }
        Ok(out)
    }

    /// Encodes a complete buffer.
    pub fn encode(filters: &[FilterType], data: &[u8]) -> Result<Vec<u8>> {
        let mut chain = Self::new(filters)?;
        let mut out = chain.encode_chunk(data)?;
        out.extend(chain.finish()?);
        Ok(out)
    }

    /// Decodes a complete buffer, applying filters in `/Filter` order.
    pub fn decode(filters: &[FilterType], data: &[u8]) -> Result<Vec<u8>> {
        let mut buffer = data.to_vec();
        for filter in filters {
            buffer = filter.decode(&buffer)?;
        }
        Ok(buffer)
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("stages", &self.encoders.len())
            .finish()
    }
}

struct AsciiHexEncoder;

impl FilterEncoder for AsciiHexEncoder {
    fn encode_chunk(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(hex::encode_upper(data).into_bytes())
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        Ok(b">".to_vec())
    }
}

fn ascii_hex_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut digits: Vec<u8> = data
        .iter()
        .copied()
        .take_while(|&b| b != b'>')
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        digits.push(b'0');
    }
    hex::decode(&digits).map_err(|e| PdfError::InvalidDataType(format!("ASCIIHexDecode: {e}")))
}

#[cfg(feature = "compression")]
struct FlateEncoder {
    inner: flate2::write::ZlibEncoder<Vec<u8>>,
}

#[cfg(feature = "compression")]
impl FilterEncoder for FlateEncoder {
    fn encode_chunk(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        use std::io::Write;

        self.inner
            .write_all(data)
            .map_err(|e| PdfError::Compression(e.to_string()))?;
        Ok(std::mem::take(self.inner.get_mut()))
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        self.inner
            .try_finish()
            .map_err(|e| PdfError::Compression(e.to_string()))?;
        Ok(std::mem::take(self.inner.get_mut()))
    }
}

#[cfg(feature = "compression")]
fn flate_encoder() -> Result<Box<dyn FilterEncoder>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    Ok(Box::new(FlateEncoder {
        inner: ZlibEncoder::new(Vec::new(), Compression::default()),
    }))
}

#[cfg(not(feature = "compression"))]
fn flate_encoder() -> Result<Box<dyn FilterEncoder>> {
    Err(PdfError::NotImplemented(
        "FlateDecode requires the compression feature".to_string(),
    ))
}

#[cfg(feature = "compression")]
fn flate_decode(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    let mut decoder = ZlibDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| PdfError::Compression(e.to_string()))?;
    Ok(decompressed)
}

#[cfg(not(feature = "compression"))]
fn flate_decode(_data: &[u8]) -> Result<Vec<u8>> {
    Err(PdfError::NotImplemented(
        "FlateDecode requires the compression feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_names() {
        assert_eq!(FilterType::FlateDecode.name(), "FlateDecode");
        assert_eq!(
            FilterType::from_name("AHx").unwrap(),
            FilterType::AsciiHexDecode
        );
        assert!(FilterType::from_name("JBIG2Decode").is_err());
    }

    #[test]
    fn test_ascii_hex_chunks() {
        let mut chain = FilterChain::new(&[FilterType::AsciiHexDecode]).unwrap();
        let mut out = chain.encode_chunk(b"AB").unwrap();
        out.extend(chain.encode_chunk(b"\n").unwrap());
        out.extend(chain.finish().unwrap());
        assert_eq!(out, b"41420A>");
        assert_eq!(FilterType::AsciiHexDecode.decode(&out).unwrap(), b"AB\n");
    }

    #[test]
    fn test_ascii_hex_decode_odd_and_whitespace() {
        assert_eq!(ascii_hex_decode(b"4 1 4>").unwrap(), vec![0x41, 0x40]);
    }

    #[test]
    fn test_passthrough_chain() {
        let mut chain = FilterChain::new(&[]).unwrap();
        assert!(chain.is_passthrough());
        assert_eq!(chain.encode_chunk(b"raw").unwrap(), b"raw");
        assert!(chain.finish().unwrap().is_empty());
    }

    #[test]
    fn test_filter_entry() {
        assert!(filter_entry(&[]).is_none());
        let single = filter_entry(&[FilterType::FlateDecode]).unwrap();
        assert_eq!(single.get_name().unwrap().as_bytes(), b"FlateDecode");
        let many = filter_entry(&[FilterType::AsciiHexDecode, FilterType::FlateDecode]).unwrap();
        assert_eq!(many.get_array().unwrap().len(), 2);
    }

    #[test]
    #[cfg(feature = "compression")]
    fn test_flate_chunked_roundtrip() {
        let original = "Hello, this is a test string that should be compressed! ".repeat(20);
        let mut chain = FilterChain::new(&[FilterType::FlateDecode]).unwrap();
        let mut encoded = Vec::new();
        for chunk in original.as_bytes().chunks(37) {
            encoded.extend(chain.encode_chunk(chunk).unwrap());
        }
        encoded.extend(chain.finish().unwrap());

        assert!(encoded.len() < original.len());
        assert_eq!(
            FilterType::FlateDecode.decode(&encoded).unwrap(),
            original.as_bytes()
        );
    }

    #[test]
    #[cfg(feature = "compression")]
    fn test_chain_order() {
        let filters = [FilterType::AsciiHexDecode, FilterType::FlateDecode];
        let encoded = FilterChain::encode(&filters, b"layered data").unwrap();
        assert!(encoded.ends_with(b">"));
        assert!(encoded.iter().all(|b| b.is_ascii_hexdigit() || *b == b'>'));
        assert_eq!(
            FilterChain::decode(&filters, &encoded).unwrap(),
            b"layered data"
        );
    }
}
