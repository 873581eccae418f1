use base64::{Engine as _, engine::general_purpose::STANDARD};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::fmt;

use crate::error::SamlError;

/// Base64-encoded SAML response as issued by the identity provider
#[derive(Clone, PartialEq, Eq)]
pub struct SamlAssertion(String);

impl SamlAssertion {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode and parse the assertion
    pub fn decode(&self) -> Result<SamlResponse, SamlError> {
        SamlResponse::from_base64(&self.0)
    }
}

// Assertions grant access; keep them out of debug logs.
impl fmt::Debug for SamlAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SamlAssertion({} bytes)", self.0.len())
    }
}

/// SAML response (provider-independent)
#[derive(Debug)]
pub struct SamlResponse {
    decoded_xml: String,
}

impl SamlResponse {
    /// Create from Base64-encoded response, rejecting anything that is not a complete XML document
    pub fn from_base64(encoded: &str) -> Result<Self, SamlError> {
        let compact: String = encoded
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let decoded = STANDARD.decode(compact)?;
        let decoded_xml = String::from_utf8(decoded)?;
        validate_xml(&decoded_xml)?;
        Ok(Self { decoded_xml })
    }

    /// Get attribute values by name, in document order
    pub fn get_attribute_values(&self, attribute_name: &str) -> Result<Vec<String>, SamlError> {
        let mut reader = Reader::from_str(&self.decoded_xml);
        reader.config_mut().trim_text(true);

        let mut values = Vec::new();
        let mut in_target_attribute = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    if is_attribute_element(e) {
                        in_target_attribute = check_attribute_name(e, attribute_name);
                    }
                }
                Ok(Event::Text(e)) if in_target_attribute => {
                    let value = e.unescape().map_err(|e| SamlError::Xml(e.to_string()))?;
                    values.push(value.into_owned());
                }
                Ok(Event::End(ref e)) => {
                    if e.local_name().as_ref() == b"Attribute" {
                        in_target_attribute = false;
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(SamlError::Xml(e.to_string())),
                _ => {}
            }
        }

        Ok(values)
    }

    /// Get the raw decoded XML content
    pub fn as_xml(&self) -> &str {
        &self.decoded_xml
    }
}

/// Walk the whole document once so truncated or mismatched markup fails early
fn validate_xml(xml: &str) -> Result<(), SamlError> {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    let mut seen_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => {
                depth += 1;
                seen_root = true;
            }
            Ok(Event::Empty(_)) => seen_root = true,
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Eof) => break,
            Err(e) => return Err(SamlError::Xml(e.to_string())),
            _ => {}
        }
    }

    if !seen_root {
        return Err(SamlError::Empty);
    }
    if depth != 0 {
        return Err(SamlError::Xml(format!("{depth} unclosed element(s)")));
    }
    Ok(())
}

fn is_attribute_element(e: &BytesStart) -> bool {
    e.local_name().as_ref() == b"Attribute"
}

/// Check if the attribute element has the specified name
fn check_attribute_name(e: &BytesStart, attribute_name: &str) -> bool {
    e.attributes().filter_map(Result::ok).any(|attr| {
        attr.key.as_ref() == b"Name" && attr.value.as_ref() == attribute_name.as_bytes()
    })
}
