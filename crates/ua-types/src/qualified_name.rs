//! Qualified names and localized text

use crate::encoding::{
    read_string, write_string, BinaryDecode, BinaryEncode, EncodingError, EncodingResult,
};
use bytes::BufMut;

/// A name qualified by a namespace index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct QualifiedName {
    pub namespace_index: u16,
    pub name: String,
}

impl QualifiedName {
    pub fn new(namespace_index: u16, name: impl Into<String>) -> Self {
        Self {
            namespace_index,
            name: name.into(),
        }
    }

    /// The null qualified name: empty name in namespace 0.
    pub fn null() -> Self {
        Self::default()
    }

    pub fn is_null(&self) -> bool {
        self.namespace_index == 0 && self.name.is_empty()
    }
}

impl std::fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.namespace_index != 0 {
            write!(f, "{}:{}", self.namespace_index, self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

impl BinaryEncode for QualifiedName {
    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u16_le(self.namespace_index);
        write_string(out, &self.name);
    }
}

impl BinaryDecode for QualifiedName {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        let namespace_index = u16::decode(stream)?;
        let name = read_string(stream)?;
        Ok(Self {
            namespace_index,
            name,
        })
    }
}

const HAS_LOCALE: u8 = 0x01;
const HAS_TEXT: u8 = 0x02;

/// Human-readable text with an optional locale tag.
///
/// A presence byte selects which of the two fields follow on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LocalizedText {
    pub locale: Option<String>,
    pub text: Option<String>,
}

impl LocalizedText {
    /// Text without a locale.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            locale: None,
            text: Some(text.into()),
        }
    }

    pub fn new(locale: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            locale: Some(locale.into()),
            text: Some(text.into()),
        }
    }

    pub fn is_null(&self) -> bool {
        self.locale.is_none() && self.text.is_none()
    }
}

impl std::fmt::Display for LocalizedText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text.as_deref().unwrap_or(""))
    }
}

impl BinaryEncode for LocalizedText {
    fn encode(&self, out: &mut Vec<u8>) {
        let mut mask = 0;
        if self.locale.is_some() {
            mask |= HAS_LOCALE;
        }
        if self.text.is_some() {
            mask |= HAS_TEXT;
        }
        out.put_u8(mask);
        if let Some(locale) = &self.locale {
            write_string(out, locale);
        }
        if let Some(text) = &self.text {
            write_string(out, text);
        }
    }
}

impl BinaryDecode for LocalizedText {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        let mask = u8::decode(stream)?;
        if mask & !(HAS_LOCALE | HAS_TEXT) != 0 {
            return Err(EncodingError::InvalidEncodingByte {
                what: "localized text",
                value: mask,
            });
        }
        let locale = if mask & HAS_LOCALE != 0 {
            Some(read_string(stream)?)
        } else {
            None
        };
        let text = if mask & HAS_TEXT != 0 {
            Some(read_string(stream)?)
        } else {
            None
        };
        Ok(Self { locale, text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_name_roundtrip() {
        let name = QualifiedName::new(2, "Objects");
        let mut out = Vec::new();
        name.encode(&mut out);

        let mut stream = out.as_slice();
        assert_eq!(QualifiedName::decode(&mut stream).unwrap(), name);
        assert!(stream.is_empty());
    }

    #[test]
    fn localized_text_masks() {
        let cases = [
            (LocalizedText::default(), 0x00u8),
            (LocalizedText::text_only("hi"), 0x02),
            (LocalizedText::new("en", "hi"), 0x03),
            (
                LocalizedText {
                    locale: Some("de".into()),
                    text: None,
                },
                0x01,
            ),
        ];
        for (text, expected_mask) in cases {
            let mut out = Vec::new();
            text.encode(&mut out);
            assert_eq!(out[0], expected_mask);

            let mut stream = out.as_slice();
            assert_eq!(LocalizedText::decode(&mut stream).unwrap(), text);
        }
    }

    #[test]
    fn localized_text_bad_mask() {
        let data = [0x04u8];
        let mut stream = data.as_slice();
        assert!(matches!(
            LocalizedText::decode(&mut stream),
            Err(EncodingError::InvalidEncodingByte { .. })
        ));
    }
}
