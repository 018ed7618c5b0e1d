//! Parser for serialized values
//!
//! Reads the syntax produced by [`Variant::write`]: direct values and
//! indirect object bodies (`N G obj ... endobj`, optionally carrying a
//! stream). Cross-reference tables and whole files are out of scope.

use super::{Array, Container, Dictionary, Name, Object, PdfString, Reference, Stream, Variant};
use crate::error::{PdfError, Result};
use crate::filters::FilterType;

/// Deepest array/dictionary nesting accepted before parsing fails.
pub const MAX_NESTING_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
enum Token<'d> {
    Integer(i64),
    Real(f64),
    String(PdfString),
    Name(Name),
    ArrayStart,
    ArrayEnd,
    DictStart,
    DictEnd,
    Keyword(&'d [u8]),
}

/// An indirect object as read from bytes.
#[derive(Debug)]
pub struct ParsedObject {
    pub reference: Reference,
    pub variant: Variant,
    /// Encoded stream body, if the object carries one.
    pub stream: Option<Vec<u8>>,
}

impl ParsedObject {
    /// Builds an [`Object`], taking stream filters from the `/Filter` entry.
    pub fn into_object(self) -> Result<Object> {
        let mut object = Object::new(self.reference, self.variant);
        if let Some(data) = self.stream {
            let filters = match object.variant().get_dictionary()?.get(Name::FILTER) {
                Some(entry) => filters_from_entry(entry)?,
                None => Vec::new(),
            };
            let mut stream = Stream::new();
            stream.set_raw(data, filters)?;
            stream.set_dirty(false);
            object.attach_stream(stream);
        }
        Ok(object)
    }
}

fn filters_from_entry(entry: &Variant) -> Result<Vec<FilterType>> {
    if let Ok(name) = entry.get_name() {
        return Ok(vec![FilterType::from_name(&name.to_text())?]);
    }
    entry
        .get_array()?
        .iter()
        .map(|item| FilterType::from_name(&item.get_name()?.to_text()))
        .collect()
}

pub struct Parser<'d> {
    data: &'d [u8],
    position: usize,
    depth: usize,
}

impl<'d> Parser<'d> {
    pub fn new(data: &'d [u8]) -> Self {
        Self {
            data,
            position: 0,
            depth: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// True when only whitespace and comments remain.
    pub fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.position >= self.data.len()
    }

    fn syntax_error(&self, message: &str) -> PdfError {
        PdfError::InvalidDataType(format!("{message} at offset {}", self.position))
    }

    fn eof_error(&self, message: &str) -> PdfError {
        PdfError::UnexpectedEof(format!("{message} at offset {}", self.position))
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.position).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(byte) = self.peek() {
            if is_whitespace(byte) {
                self.position += 1;
            } else if byte == b'%' {
                while let Some(byte) = self.peek() {
                    if byte == b'\n' || byte == b'\r' {
                        break;
                    }
                    self.position += 1;
                }
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token<'d>>> {
        self.skip_whitespace();
        let Some(byte) = self.peek() else {
            return Ok(None);
        };

        let token = match byte {
            b'/' => {
                self.position += 1;
                let start = self.position;
                self.skip_regular();
                Token::Name(Name::from_escaped(&self.data[start..self.position]))
            }
            b'(' => Token::String(self.read_literal_string()?),
            b'<' if self.data.get(self.position + 1) == Some(&b'<') => {
                self.position += 2;
                Token::DictStart
            }
            b'<' => Token::String(self.read_hex_string()?),
            b'>' if self.data.get(self.position + 1) == Some(&b'>') => {
                self.position += 2;
                Token::DictEnd
            }
            b'[' => {
                self.position += 1;
                Token::ArrayStart
            }
            b']' => {
                self.position += 1;
                Token::ArrayEnd
            }
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.read_number()?,
            _ if is_delimiter(byte) => return Err(self.syntax_error("unexpected delimiter")),
            _ => {
                let start = self.position;
                self.skip_regular();
                Token::Keyword(&self.data[start..self.position])
            }
        };
        Ok(Some(token))
    }

    fn skip_regular(&mut self) {
        while let Some(byte) = self.peek() {
            if is_whitespace(byte) || is_delimiter(byte) {
                break;
            }
            self.position += 1;
        }
    }

    fn read_number(&mut self) -> Result<Token<'d>> {
        let start = self.position;
        self.skip_regular();
        let text = std::str::from_utf8(&self.data[start..self.position])
            .map_err(|_| self.syntax_error("malformed number"))?;

        if !text.contains('.') {
            if let Ok(value) = text.parse::<i64>() {
                return Ok(Token::Integer(value));
            }
        }
        text.parse::<f64>()
            .map(Token::Real)
            .map_err(|_| self.syntax_error(&format!("malformed number {text:?}")))
    }

    fn read_literal_string(&mut self) -> Result<PdfString> {
        self.position += 1;
        let mut bytes = Vec::new();
        let mut depth = 1;

        loop {
            let byte = self
                .peek()
                .ok_or_else(|| self.eof_error("unterminated string"))?;
            self.position += 1;
            match byte {
                b'\\' => {
                    let escaped = self
                        .peek()
                        .ok_or_else(|| self.eof_error("unterminated string"))?;
                    self.position += 1;
                    match escaped {
                        b'n' => bytes.push(b'\n'),
                        b'r' => bytes.push(b'\r'),
                        b't' => bytes.push(b'\t'),
                        b'b' => bytes.push(0x08),
                        b'f' => bytes.push(0x0C),
                        b'0'..=b'7' => {
                            let mut value = u32::from(escaped - b'0');
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(digit @ b'0'..=b'7') => {
                                        value = value * 8 + u32::from(digit - b'0');
                                        self.position += 1;
                                    }
                                    _ => break,
                                }
                            }
                            bytes.push(value as u8);
                        }
                        // Line continuation.
                        b'\r' => {
                            if self.peek() == Some(b'\n') {
                                self.position += 1;
                            }
                        }
                        b'\n' => {}
                        other => bytes.push(other),
                    }
                }
                b'(' => {
                    depth += 1;
                    bytes.push(byte);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(PdfString::new(bytes));
                    }
                    bytes.push(byte);
                }
                other => bytes.push(other),
            }
        }
    }

    fn read_hex_string(&mut self) -> Result<PdfString> {
        self.position += 1;
        let start = self.position;
        while self.peek().ok_or_else(|| self.eof_error("unterminated hex string"))? != b'>' {
            self.position += 1;
        }
        let mut digits: Vec<u8> = self.data[start..self.position]
            .iter()
            .copied()
            .filter(|b| !is_whitespace(*b))
            .collect();
        self.position += 1;

        if digits.len() % 2 != 0 {
            digits.push(b'0');
        }
        let bytes = hex::decode(&digits).map_err(|_| self.syntax_error("invalid hex string"))?;
        Ok(PdfString::hex(bytes))
    }

    fn expect_token(&mut self, what: &str) -> Result<Token<'d>> {
        self.next_token()?
            .ok_or_else(|| self.eof_error(&format!("expected {what}")))
    }

    fn expect_keyword(&mut self, keyword: &[u8]) -> Result<()> {
        let label = String::from_utf8_lossy(keyword);
        match self.expect_token(&label)? {
            Token::Keyword(found) if found == keyword => Ok(()),
            other => Err(self.syntax_error(&format!("expected {label}, found {other:?}"))),
        }
    }

    /// Parses one direct value.
    pub fn parse_variant(&mut self) -> Result<Variant> {
        let token = self.expect_token("value")?;
        self.parse_from(token)
    }

    fn parse_from(&mut self, token: Token<'d>) -> Result<Variant> {
        match token {
            Token::Integer(number) => {
                if let Some(reference) = self.try_reference(number) {
                    return Ok(Variant::from(reference));
                }
                Ok(Variant::from(number))
            }
            Token::Real(value) => Ok(Variant::from(value)),
            Token::String(value) => Ok(Variant::from(value)),
            Token::Name(value) => Ok(Variant::from(value)),
            Token::ArrayStart => self.nested(Self::parse_array),
            Token::DictStart => self.nested(Self::parse_dictionary),
            Token::Keyword(b"true") => Ok(Variant::from(true)),
            Token::Keyword(b"false") => Ok(Variant::from(false)),
            Token::Keyword(b"null") => Ok(Variant::null()),
            other => Err(self.syntax_error(&format!("unexpected token {other:?}"))),
        }
    }

    fn nested(&mut self, parse: fn(&mut Self) -> Result<Variant>) -> Result<Variant> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.syntax_error(&format!(
                "nesting deeper than {MAX_NESTING_DEPTH} levels"
            )));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_array(&mut self) -> Result<Variant> {
        let mut array = Array::new();
        loop {
            match self.expect_token("]")? {
                Token::ArrayEnd => break,
                token => array.push(self.parse_from(token)?)?,
            }
        }
        array.set_dirty(false);
        Ok(Variant::from(array))
    }

    fn parse_dictionary(&mut self) -> Result<Variant> {
        let mut dict = Dictionary::new();
        loop {
            match self.expect_token(">>")? {
                Token::DictEnd => break,
                Token::Name(key) => {
                    let value = self.parse_variant()?;
                    dict.set(key, value)?;
                }
                other => {
                    return Err(self.syntax_error(&format!("expected name key, found {other:?}")))
                }
            }
        }
        dict.set_dirty(false);
        Ok(Variant::from(dict))
    }

    /// After an integer, consumes `G R` if present.
    fn try_reference(&mut self, number: i64) -> Option<Reference> {
        let saved = self.position;
        let reference = (|| {
            let number = u32::try_from(number).ok()?;
            let Ok(Some(Token::Integer(generation))) = self.next_token() else {
                return None;
            };
            let generation = u16::try_from(generation).ok()?;
            match self.next_token() {
                Ok(Some(Token::Keyword(b"R"))) => Some(Reference::new(number, generation)),
                _ => None,
            }
        })();
        if reference.is_none() {
            self.position = saved;
        }
        reference
    }

    /// True when the input starts with `N G obj`.
    pub fn looks_like_indirect(&mut self) -> bool {
        let saved = self.position;
        let matched = matches!(
            (self.next_token(), self.next_token(), self.next_token()),
            (
                Ok(Some(Token::Integer(_))),
                Ok(Some(Token::Integer(_))),
                Ok(Some(Token::Keyword(b"obj")))
            )
        );
        self.position = saved;
        matched
    }

    /// Parses `N G obj <value> [stream ... endstream] endobj`.
    pub fn parse_indirect(&mut self) -> Result<ParsedObject> {
        let number = match self.expect_token("object number")? {
            Token::Integer(n) => u32::try_from(n).map_err(|_| self.syntax_error("object number"))?,
            other => return Err(self.syntax_error(&format!("expected object number, found {other:?}"))),
        };
        let generation = match self.expect_token("generation")? {
            Token::Integer(g) => u16::try_from(g).map_err(|_| self.syntax_error("generation"))?,
            other => return Err(self.syntax_error(&format!("expected generation, found {other:?}"))),
        };
        self.expect_keyword(b"obj")?;

        let variant = self.parse_variant()?;
        let stream = match self.expect_token("endobj")? {
            Token::Keyword(b"endobj") => None,
            Token::Keyword(b"stream") => {
                let length = variant
                    .get_dictionary()?
                    .get(Name::LENGTH)
                    .and_then(|length| match length.data() {
                        Ok(super::VariantData::Number(n)) => usize::try_from(*n).ok(),
                        _ => None,
                    });
                let data = self.read_stream_body(length)?;
                self.expect_keyword(b"endobj")?;
                Some(data)
            }
            other => return Err(self.syntax_error(&format!("expected endobj, found {other:?}"))),
        };

        Ok(ParsedObject {
            reference: Reference::new(number, generation),
            variant,
            stream,
        })
    }

    /// Reads the body after the `stream` keyword through `endstream`. An
    /// unusable `length` falls back to scanning for `endstream`.
    fn read_stream_body(&mut self, length: Option<usize>) -> Result<Vec<u8>> {
        match (self.peek(), self.data.get(self.position + 1)) {
            (Some(b'\r'), Some(b'\n')) => self.position += 2,
            (Some(b'\n'), _) | (Some(b'\r'), _) => self.position += 1,
            _ => {}
        }
        let start = self.position;

        if let Some(length) = length {
            let end = start + length;
            if end <= self.data.len() {
                self.position = end;
                if self.expect_keyword(b"endstream").is_ok() {
                    return Ok(self.data[start..end].to_vec());
                }
                self.position = start;
            }
        }

        let marker = b"endstream";
        let found = self.data[start..]
            .windows(marker.len())
            .position(|window| window == marker)
            .ok_or_else(|| self.eof_error("missing endstream"))?;
        let mut end = start + found;
        self.position = end + marker.len();
        if end > start && self.data[end - 1] == b'\n' {
            end -= 1;
            if end > start && self.data[end - 1] == b'\r' {
                end -= 1;
            }
        } else if end > start && self.data[end - 1] == b'\r' {
            end -= 1;
        }
        Ok(self.data[start..end].to_vec())
    }
}

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b'\0' | b'\t' | b'\n' | 0x0C | b'\r' | b' ')
}

fn is_delimiter(byte: u8) -> bool {
    matches!(
        byte,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// Parses a single direct value; trailing content is an error.
pub fn parse_variant(data: &[u8]) -> Result<Variant> {
    let mut parser = Parser::new(data);
    let variant = parser.parse_variant()?;
    if !parser.at_end() {
        return Err(parser.syntax_error("trailing data after value"));
    }
    Ok(variant)
}

/// Parses either an indirect object body or a bare direct value, returning
/// the value.
pub fn parse_object_body(data: &[u8]) -> Result<Variant> {
    let mut parser = Parser::new(data);
    if parser.looks_like_indirect() {
        Ok(parser.parse_indirect()?.variant)
    } else {
        parser.parse_variant()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::device::OutputDevice;
    use crate::objects::{DataType, WriteMode};

    #[test]
    fn test_parse_scalars() {
        assert!(parse_variant(b"null").unwrap().is_null());
        assert!(parse_variant(b" true ").unwrap().get_bool().unwrap());
        assert_eq!(parse_variant(b"-42").unwrap().get_number().unwrap(), -42);
        assert_eq!(parse_variant(b"3.25").unwrap().get_real().unwrap(), 3.25);
        assert_eq!(parse_variant(b"-.5").unwrap().get_real().unwrap(), -0.5);
        assert_eq!(parse_variant(b"/A#20B").unwrap().get_name().unwrap(), "A B");
    }

    #[test]
    fn test_latin1_name_roundtrip() {
        let name = parse_variant(b"/Caf#E9").unwrap();
        assert_eq!(name.get_name().unwrap().as_bytes(), b"Caf\xE9");
        for mode in [WriteMode::COMPACT, WriteMode::CLEAN] {
            let mut device = OutputDevice::memory();
            name.write(&mut device, mode, None).unwrap();
            assert_eq!(device.into_bytes().unwrap(), b"/Caf#E9");
        }
    }

    #[test]
    fn test_nesting_limit() {
        let depth = 200_000;
        let mut deep = vec![b'['; depth];
        deep.extend(std::iter::repeat(b']').take(depth));
        let error = parse_variant(&deep).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidDataType);

        let mut dicts = b"<</A ".repeat(MAX_NESTING_DEPTH + 1);
        dicts.extend(b">>".repeat(MAX_NESTING_DEPTH + 1));
        assert_eq!(parse_variant(&dicts).unwrap_err().kind(), ErrorKind::InvalidDataType);

        let mut allowed = vec![b'['; MAX_NESTING_DEPTH];
        allowed.extend(std::iter::repeat(b']').take(MAX_NESTING_DEPTH));
        let mut value = parse_variant(&allowed).unwrap();
        for _ in 1..MAX_NESTING_DEPTH {
            value = value.get_array().unwrap().get(0).unwrap().clone();
        }
        assert!(value.get_array().unwrap().is_empty());
    }

    #[test]
    fn test_parse_strings() {
        let literal = parse_variant(b"(a\\(b\\)\\n\\101(c))").unwrap();
        assert_eq!(literal.get_string().unwrap().as_bytes(), b"a(b)\nA(c)");

        let hex = parse_variant(b"<48 65 6C6C 6F>").unwrap();
        assert_eq!(hex.get_string().unwrap().as_bytes(), b"Hello");
        assert_eq!(hex.data_type().unwrap(), DataType::HexString);

        let odd = parse_variant(b"<414>").unwrap();
        assert_eq!(odd.get_string().unwrap().as_bytes(), b"A@");
    }

    #[test]
    fn test_parse_reference_and_plain_integers() {
        let array = parse_variant(b"[1 0 R 2 3 4 0 R 5]").unwrap();
        let array = array.get_array().unwrap();
        assert_eq!(array.len(), 4);
        assert_eq!(array.get(0).unwrap().get_reference().unwrap(), Reference::new(1, 0));
        assert_eq!(array.get(1).unwrap().get_number().unwrap(), 2);
        assert_eq!(array.get(2).unwrap().get_reference().unwrap(), Reference::new(3, 4));
        assert_eq!(array.get(3).unwrap().get_number().unwrap(), 5);
    }

    #[test]
    fn test_parse_dictionary_is_clean() {
        let value = parse_variant(b"<</Type/Catalog/Pages 2 0 R % comment\n/Open true>>").unwrap();
        let dict = value.get_dictionary().unwrap();
        assert_eq!(dict.type_name().unwrap(), "Catalog");
        assert_eq!(dict.get("Pages").unwrap().get_reference().unwrap(), Reference::new(2, 0));
        assert!(!value.is_dirty());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_variant(b"[1 2").unwrap_err().kind(), ErrorKind::UnexpectedEof);
        assert_eq!(parse_variant(b"(abc").unwrap_err().kind(), ErrorKind::UnexpectedEof);
        assert_eq!(parse_variant(b"<</A>>").unwrap_err().kind(), ErrorKind::InvalidDataType);
        assert_eq!(parse_variant(b"1 2").unwrap_err().kind(), ErrorKind::InvalidDataType);
        assert_eq!(parse_variant(b"<<1 2>>").unwrap_err().kind(), ErrorKind::InvalidDataType);
    }

    #[test]
    fn test_roundtrip_written_value() {
        let mut dict = Dictionary::with_type("Annot");
        dict.set("Rect", vec![Variant::from(0), Variant::from(10.5), Variant::from(-3)])
            .unwrap();
        dict.set("Contents", PdfString::from_text("caf\u{e9}")).unwrap();
        dict.set("P", Reference::new(7, 0)).unwrap();
        let original = Variant::from(dict);

        for mode in [WriteMode::COMPACT, WriteMode::CLEAN] {
            let mut device = OutputDevice::memory();
            original.write(&mut device, mode, None).unwrap();
            let bytes = device.into_bytes().unwrap();
            assert_eq!(parse_variant(&bytes).unwrap(), original, "{mode:?}");
        }
    }

    #[test]
    fn test_parse_indirect_with_stream() {
        let data = b"4 0 obj\n<</Length 5/Filter/ASCIIHexDecode>>\nstream\n6869>\n\nendstream\nendobj\n";
        let parsed = Parser::new(data).parse_indirect().unwrap();
        assert_eq!(parsed.reference, Reference::new(4, 0));
        assert_eq!(parsed.stream.as_deref(), Some(&b"6869>"[..]));

        let object = parsed.into_object().unwrap();
        let stream = object.stream().unwrap();
        assert_eq!(stream.filters(), &[FilterType::AsciiHexDecode]);
        assert_eq!(stream.filtered_copy().unwrap(), b"hi");
    }

    #[test]
    fn test_stream_without_usable_length() {
        let data = b"5 0 obj\n<</Length 9 0 R>>\nstream\r\nabc\r\nendstream\nendobj";
        let parsed = Parser::new(data).parse_indirect().unwrap();
        assert_eq!(parsed.stream.unwrap(), b"abc");
    }

    #[test]
    fn test_parse_object_body() {
        assert_eq!(parse_object_body(b"12 0 obj\n(x)\nendobj\n").unwrap(), Variant::from("x"));
        assert_eq!(parse_object_body(b"12").unwrap().get_number().unwrap(), 12);
        assert_eq!(parse_object_body(b"1 0 R").unwrap().get_reference().unwrap(), Reference::new(1, 0));
    }
}
