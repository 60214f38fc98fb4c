//! Key-value parameter storage for distortion models.
//!
//! Distortion models persist their coefficients into a flat string-keyed
//! store. The [`PropertyStore`] trait is the seam the models are written
//! against, so callers can plug in their own configuration backend. The
//! [`Properties`] type is the implementation shipped with the crate; it reads
//! and writes YAML, JSON and plain `key=value` text files.
//!
//! Keys may be namespaced by a camera id with [`camera_key`], which appends the
//! decimal id directly to the key name (`k1` for camera 0 becomes `k10`).

use log::warn;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use yaml_rust::{Yaml, YamlLoader};

#[derive(thiserror::Error, Debug)]
pub enum PropertiesError {
    #[error("IO Error: {0}")]
    IOError(String),
    #[error("Failed to process YAML: {0}")]
    YamlError(String),
    #[error("Failed to process JSON: {0}")]
    JsonError(String),
    #[error("Malformed property line {line}: '{content}'")]
    MalformedLine { line: usize, content: String },
    #[error("Value '{value}' of property '{key}' is not a number")]
    MalformedValue { key: String, value: String },
}

impl From<std::io::Error> for PropertiesError {
    fn from(err: std::io::Error) -> Self {
        PropertiesError::IOError(err.to_string())
    }
}

impl From<yaml_rust::ScanError> for PropertiesError {
    fn from(err: yaml_rust::ScanError) -> Self {
        PropertiesError::YamlError(err.to_string())
    }
}

impl From<serde_yaml::Error> for PropertiesError {
    fn from(err: serde_yaml::Error) -> Self {
        PropertiesError::YamlError(err.to_string())
    }
}

impl From<serde_json::Error> for PropertiesError {
    fn from(err: serde_json::Error) -> Self {
        PropertiesError::JsonError(err.to_string())
    }
}

/// Builds the store key for `name`, namespaced by an optional camera id.
///
/// # Examples
///
/// ```rust
/// use lens_distortion::properties::camera_key;
///
/// assert_eq!(camera_key("k1", None), "k1");
/// assert_eq!(camera_key("k1", Some(0)), "k10");
/// assert_eq!(camera_key("s4", Some(12)), "s412");
/// ```
pub fn camera_key(name: &str, id: Option<u32>) -> String {
    match id {
        Some(id) => format!("{name}{id}"),
        None => name.to_string(),
    }
}

/// String-keyed storage that distortion models read from and write into.
///
/// Values are kept as text; the numeric accessors parse and format `f64`.
pub trait PropertyStore {
    /// Returns the raw value stored under `key`.
    fn get(&self, key: &str) -> Option<&str>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: String);

    /// Removes `key` and returns its previous value.
    fn remove(&mut self, key: &str) -> Option<String>;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Reads `key` as a floating point number.
    ///
    /// Returns `Ok(None)` if the key is absent and
    /// [`PropertiesError::MalformedValue`] if the value does not parse.
    fn get_f64(&self, key: &str) -> Result<Option<f64>, PropertiesError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => match value.trim().parse::<f64>() {
                Ok(v) => Ok(Some(v)),
                Err(_) => {
                    warn!("Property '{key}' has non-numeric value '{value}'");
                    Err(PropertiesError::MalformedValue {
                        key: key.to_string(),
                        value: value.to_string(),
                    })
                }
            },
        }
    }

    /// Stores `value` under `key` using its shortest exact decimal form.
    fn set_f64(&mut self, key: &str, value: f64) {
        self.set(key, value.to_string());
    }
}

impl PropertyStore for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<&str> {
        HashMap::get(self, key).map(String::as_str)
    }

    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) -> Option<String> {
        HashMap::remove(self, key)
    }
}

/// Ordered property store with file persistence.
///
/// # Examples
///
/// ```rust
/// use lens_distortion::properties::{Properties, PropertyStore};
///
/// let mut prop = Properties::parse_text("# lens\nk1=-0.25\nk2 = 0.07\n").unwrap();
/// assert_eq!(prop.get_f64("k1").unwrap(), Some(-0.25));
///
/// prop.set_f64("p1", 0.001);
/// assert!(prop.to_text().contains("p1=0.001"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    values: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Loads a property file, choosing the format from the file extension:
    /// `.yaml`/`.yml`, `.json`, or `key=value` text for anything else.
    ///
    /// # Errors
    ///
    /// * [`PropertiesError::IOError`] if the file cannot be read.
    /// * [`PropertiesError::YamlError`], [`PropertiesError::JsonError`] or
    ///   [`PropertiesError::MalformedLine`] if the content does not parse.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PropertiesError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        match FileFormat::from_path(path) {
            FileFormat::Yaml => Self::from_yaml_str(&contents),
            FileFormat::Json => Self::from_json_str(&contents),
            FileFormat::Text => Self::parse_text(&contents),
        }
    }

    /// Saves all entries, choosing the format from the file extension in the
    /// same way as [`Properties::load`].
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PropertiesError> {
        let path = path.as_ref();
        let contents = match FileFormat::from_path(path) {
            FileFormat::Yaml => self.to_yaml_string()?,
            FileFormat::Json => self.to_json_string()?,
            FileFormat::Text => self.to_text(),
        };

        let mut file = File::create(path)?;
        file.write_all(contents.as_bytes())?;
        Ok(())
    }

    /// Parses `key=value` lines. Blank lines and lines starting with `#` are
    /// ignored; keys and values are trimmed.
    pub fn parse_text(text: &str) -> Result<Self, PropertiesError> {
        let mut prop = Properties::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| PropertiesError::MalformedLine {
                    line: i + 1,
                    content: line.to_string(),
                })?;

            let key = key.trim();
            if key.is_empty() {
                return Err(PropertiesError::MalformedLine {
                    line: i + 1,
                    content: line.to_string(),
                });
            }
            prop.values.insert(key.to_string(), value.trim().to_string());
        }
        Ok(prop)
    }

    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for (key, value) in &self.values {
            text.push_str(key);
            text.push('=');
            text.push_str(value);
            text.push('\n');
        }
        text
    }

    /// Reads the top-level mapping of a YAML document. Scalar values are kept
    /// as text; nested sequences and mappings are skipped.
    pub fn from_yaml_str(contents: &str) -> Result<Self, PropertiesError> {
        let docs = YamlLoader::load_from_str(contents)?;
        let mut prop = Properties::new();

        let Some(doc) = docs.first() else {
            return Ok(prop);
        };

        let hash = doc.as_hash().ok_or_else(|| {
            PropertiesError::YamlError("Top-level YAML node must be a mapping".to_string())
        })?;

        for (key, value) in hash {
            let key = match yaml_scalar(key) {
                Some(key) => key,
                None => {
                    warn!("Skipping YAML entry with non-scalar key {key:?}");
                    continue;
                }
            };
            match yaml_scalar(value) {
                Some(value) => {
                    prop.values.insert(key, value);
                }
                None => warn!("Skipping YAML entry '{key}' with non-scalar value"),
            }
        }
        Ok(prop)
    }

    /// Writes all entries as a flat YAML mapping. Values written in the
    /// canonical form of an integer or a float are emitted as YAML numbers,
    /// everything else as strings.
    pub fn to_yaml_string(&self) -> Result<String, PropertiesError> {
        let mapping = serde_yaml::Mapping::from_iter(self.values.iter().map(|(key, value)| {
            let value = match Scalar::classify(value) {
                Scalar::Integer(i) => serde_yaml::Value::Number(i.into()),
                Scalar::Float(v) => serde_yaml::Value::Number(v.into()),
                Scalar::Text => serde_yaml::Value::String(value.clone()),
            };
            (serde_yaml::Value::String(key.clone()), value)
        }));
        Ok(serde_yaml::to_string(&mapping)?)
    }

    /// Reads the top-level object of a JSON document. Nested arrays and
    /// objects are skipped.
    pub fn from_json_str(contents: &str) -> Result<Self, PropertiesError> {
        let doc: serde_json::Value = serde_json::from_str(contents)?;
        let object = doc.as_object().ok_or_else(|| {
            PropertiesError::JsonError("Top-level JSON value must be an object".to_string())
        })?;

        let mut prop = Properties::new();
        for (key, value) in object {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => {
                    warn!("Skipping JSON entry '{key}' with non-scalar value");
                    continue;
                }
            };
            prop.values.insert(key.clone(), value);
        }
        Ok(prop)
    }

    pub fn to_json_string(&self) -> Result<String, PropertiesError> {
        let object: serde_json::Map<String, serde_json::Value> = self
            .values
            .iter()
            .map(|(key, value)| {
                let value = match Scalar::classify(value) {
                    Scalar::Integer(i) => serde_json::Value::from(i),
                    Scalar::Float(v) => serde_json::Value::from(v),
                    Scalar::Text => serde_json::Value::String(value.clone()),
                };
                (key.clone(), value)
            })
            .collect();
        Ok(serde_json::to_string_pretty(&serde_json::Value::Object(
            object,
        ))?)
    }
}

impl PropertyStore for Properties {
    fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    fn set(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }
}

enum FileFormat {
    Yaml,
    Json,
    Text,
}

impl FileFormat {
    fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Text,
        }
    }
}

/// How a stored value is written to a typed file format.
enum Scalar {
    Integer(i64),
    Float(f64),
    Text,
}

impl Scalar {
    /// Only text that formats back identically is treated as a number, so
    /// `007` or `1e-5` keep their spelling.
    fn classify(value: &str) -> Self {
        if let Ok(i) = value.parse::<i64>() {
            if i.to_string() == value {
                return Scalar::Integer(i);
            }
        }
        match value.parse::<f64>() {
            Ok(v) if v.is_finite() && v.to_string() == value => Scalar::Float(v),
            _ => Scalar::Text,
        }
    }
}

fn yaml_scalar(node: &Yaml) -> Option<String> {
    match node {
        Yaml::Real(s) | Yaml::String(s) => Some(s.clone()),
        Yaml::Integer(i) => Some(i.to_string()),
        Yaml::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_key() {
        assert_eq!(camera_key("p1", None), "p1");
        assert_eq!(camera_key("p1", Some(3)), "p13");
    }

    #[test]
    fn test_parse_text() {
        let text = "\n# comment\nk1 = 0.5\np2=-1e-3\nname=front\n";
        let prop = Properties::parse_text(text).unwrap();

        assert_eq!(prop.len(), 3);
        assert_eq!(prop.get("name"), Some("front"));
        assert_eq!(prop.get_f64("k1").unwrap(), Some(0.5));
        assert_eq!(prop.get_f64("p2").unwrap(), Some(-1e-3));
        assert_eq!(prop.get_f64("k2").unwrap(), None);
    }

    #[test]
    fn test_parse_text_malformed_line() {
        let err = Properties::parse_text("k1=0.1\nbroken line\n").unwrap_err();
        match err {
            PropertiesError::MalformedLine { line, content } => {
                assert_eq!(line, 2);
                assert_eq!(content, "broken line");
            }
            other => panic!("Unexpected error: {other:?}"),
        }
        assert!(Properties::parse_text("=3").is_err());
    }

    #[test]
    fn test_get_f64_malformed_value() {
        let mut prop = Properties::new();
        prop.set("k1", "abc".to_string());
        assert!(matches!(
            prop.get_f64("k1"),
            Err(PropertiesError::MalformedValue { .. })
        ));
    }

    #[test]
    fn test_set_f64_is_exact() {
        let mut prop = Properties::new();
        let value = 0.1 + 0.2;
        prop.set_f64("k1", value);
        assert_eq!(prop.get_f64("k1").unwrap(), Some(value));
    }

    #[test]
    fn test_remove() {
        let mut prop = Properties::parse_text("k1=1\nk2=2").unwrap();
        assert_eq!(prop.remove("k1"), Some("1".to_string()));
        assert_eq!(prop.remove("k1"), None);
        assert!(!prop.contains("k1"));
        assert!(prop.contains("k2"));
    }

    #[test]
    fn test_yaml_string_round_trip() {
        let mut prop = Properties::new();
        prop.set_f64("k1", -0.28340811);
        prop.set_f64("p2", 1.76187114e-05);
        prop.set("camera", "left".to_string());

        let yaml = prop.to_yaml_string().unwrap();
        let loaded = Properties::from_yaml_str(&yaml).unwrap();

        assert_eq!(loaded.get_f64("k1").unwrap(), Some(-0.28340811));
        assert_eq!(loaded.get_f64("p2").unwrap(), Some(1.76187114e-05));
        assert_eq!(loaded.get("camera"), Some("left"));
    }

    #[test]
    fn test_yaml_skips_nested_values() {
        let yaml = "k1: 0.25\nk2: 3\nresolution: [752, 480]\n";
        let prop = Properties::from_yaml_str(yaml).unwrap();
        assert_eq!(prop.len(), 2);
        assert_eq!(prop.get_f64("k2").unwrap(), Some(3.0));
    }

    #[test]
    fn test_yaml_rejects_sequence_document() {
        assert!(matches!(
            Properties::from_yaml_str("- 1\n- 2\n"),
            Err(PropertiesError::YamlError(_))
        ));
    }

    #[test]
    fn test_json_string_round_trip() {
        let mut prop = Properties::new();
        prop.set_f64("e1", 0.0123);
        prop.set_f64("e4", -4.5e-7);

        let json = prop.to_json_string().unwrap();
        let loaded = Properties::from_json_str(&json).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get_f64("e1").unwrap(), Some(0.0123));
        assert_eq!(loaded.get_f64("e4").unwrap(), Some(-4.5e-7));
    }

    #[test]
    fn test_json_full_precision_round_trip() {
        let values = [
            0.1 + 0.2,
            -3.7793055777751765e-4,
            1.0 / 3.0,
            4.999999999999999e-4,
            -2.2250738585072014e-308,
        ];
        let mut prop = Properties::new();
        for (i, v) in values.iter().enumerate() {
            prop.set_f64(&format!("k{}", i + 1), *v);
        }

        let loaded = Properties::from_json_str(&prop.to_json_string().unwrap()).unwrap();
        for (i, v) in values.iter().enumerate() {
            assert_eq!(loaded.get_f64(&format!("k{}", i + 1)).unwrap(), Some(*v));
        }
    }

    #[test]
    fn test_typed_formats_keep_integers_and_text() {
        let prop = Properties::parse_text("width=1280
label=007
step=1e-5
k1=-0.25").unwrap();

        let yaml = prop.to_yaml_string().unwrap();
        assert!(yaml.contains("width: 1280\n"), "{yaml}");
        let json = prop.to_json_string().unwrap();
        assert!(json.contains("\"width\": 1280"), "{json}");
        assert!(json.contains("\"label\": \"007\""), "{json}");

        for loaded in [
            Properties::from_yaml_str(&yaml).unwrap(),
            Properties::from_json_str(&json).unwrap(),
        ] {
            assert_eq!(loaded.get("width"), Some("1280"));
            assert_eq!(loaded.get("label"), Some("007"));
            assert_eq!(loaded.get("step"), Some("1e-5"));
            assert_eq!(loaded.get_f64("k1").unwrap(), Some(-0.25));
        }
    }

    #[test]
    fn test_hash_map_store() {
        let mut map: HashMap<String, String> = HashMap::new();
        map.set_f64("k3", 2.5);
        assert!(map.contains("k3"));
        assert_eq!(map.get_f64("k3").unwrap(), Some(2.5));
        assert_eq!(PropertyStore::remove(&mut map, "k3"), Some("2.5".to_string()));
    }
}
