//! Configuration document model.
//!
//! Aircraft, engine, thruster, system and output descriptions are element
//! trees encoded as JSON. Every element has a tag `name`, optional
//! `attributes`, optional scalar `text` and ordered `children`:
//!
//! ```json
//! { "name": "metrics",
//!   "children": [ { "name": "wingarea", "text": 174.0 } ] }
//! ```
//!
//! Attribute values and text may be written as JSON strings or numbers.

use std::collections::BTreeMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Configuration version this build understands.
pub const NEEDED_CFG_VERSION: &str = "2.0";

/// One element of a configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Element>,
}

fn scalar_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder: set an attribute.
    pub fn with_attribute(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Builder: set the text content.
    pub fn with_text(mut self, text: impl Into<serde_json::Value>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder: append a child.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// First child with the given tag.
    pub fn find_element(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given tag, in document order.
    pub fn find_elements<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn attribute(&self, key: &str) -> Option<String> {
        self.attributes.get(key).map(scalar_to_string)
    }

    pub fn require_attribute(&self, key: &str) -> Result<String, ConfigError> {
        self.attribute(key).ok_or_else(|| ConfigError::MissingAttribute {
            element: self.name.clone(),
            attribute: key.to_string(),
        })
    }

    /// Numeric attribute, `None` when absent.
    pub fn attribute_as_number(&self, key: &str) -> Result<Option<f64>, ConfigError> {
        match self.attribute(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<f64>().map(Some).map_err(|_| ConfigError::InvalidNumber {
                element: format!("{}@{}", self.name, key),
                value: raw,
            }),
        }
    }

    /// Trimmed text content.
    pub fn text(&self) -> Option<String> {
        self.text.as_ref().map(scalar_to_string)
    }

    pub fn value_as_number(&self) -> Result<f64, ConfigError> {
        let raw = self.text().unwrap_or_default();
        raw.parse::<f64>().map_err(|_| ConfigError::InvalidNumber {
            element: self.name.clone(),
            value: raw,
        })
    }

    /// Numeric text of the first child named `name`, `None` when absent.
    pub fn find_element_value_as_number(&self, name: &str) -> Result<Option<f64>, ConfigError> {
        self.find_element(name).map(Element::value_as_number).transpose()
    }

    /// Numeric text of the first child named `name`, or `default`.
    pub fn number_or(&self, name: &str, default: f64) -> Result<f64, ConfigError> {
        Ok(self.find_element_value_as_number(name)?.unwrap_or(default))
    }

    /// Numeric text of a required child.
    pub fn require_number(&self, name: &str) -> Result<f64, ConfigError> {
        self.find_element_value_as_number(name)?
            .ok_or_else(|| ConfigError::MissingElement {
                parent: self.name.clone(),
                name: name.to_string(),
            })
    }

    /// `(x, z)` of a `location`-style child holding `x` and `z` elements.
    pub fn find_xz(&self, name: &str) -> Result<(f64, f64), ConfigError> {
        match self.find_element(name) {
            None => Ok((0.0, 0.0)),
            Some(loc) => Ok((loc.number_or("x", 0.0)?, loc.number_or("z", 0.0)?)),
        }
    }
}

/// Read an element tree from a JSON file.
pub fn load_document(path: &Path) -> Result<Element, ConfigError> {
    read_json(path)
}

/// Read any serde-deserializable JSON document.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let display = path.display().to_string();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: display.clone(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: display,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_and_numbers_are_interchangeable() {
        let json = r#"{
            "name": "metrics",
            "attributes": { "version": 2.0, "release": "BETA" },
            "children": [
                { "name": "wingarea", "text": 174 },
                { "name": "wingspan", "text": " 35.8 " }
            ]
        }"#;
        let el: Element = serde_json::from_str(json).unwrap();
        assert_eq!(el.attribute("release").as_deref(), Some("BETA"));
        assert_eq!(el.attribute_as_number("version").unwrap(), Some(2.0));
        assert_eq!(el.require_number("wingarea").unwrap(), 174.0);
        assert_eq!(el.number_or("wingspan", 0.0).unwrap(), 35.8);
        assert_eq!(el.number_or("chord", 4.9).unwrap(), 4.9);
    }

    #[test]
    fn non_numeric_text_is_an_error() {
        let el = Element::new("x").with_child(Element::new("gain").with_text("fast"));
        assert!(matches!(
            el.require_number("gain"),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            el.require_number("missing"),
            Err(ConfigError::MissingElement { .. })
        ));
    }

    #[test]
    fn find_elements_preserves_document_order() {
        let el = Element::new("channel")
            .with_child(Element::new("input").with_text("a"))
            .with_child(Element::new("gain").with_text(1))
            .with_child(Element::new("input").with_text("b"));
        let inputs: Vec<String> = el.find_elements("input").filter_map(Element::text).collect();
        assert_eq!(inputs, vec!["a", "b"]);
    }

    #[test]
    fn missing_file_reports_io_error() {
        let err = load_document(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
