use crate::error::{ConfigError, ParseError};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Flat key/value mapping read from a config file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigMap {
    entries: HashMap<String, String>,
}

impl ConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value stored for `key`, if any
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Insert a value, replacing any earlier one for the same key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConfigMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

/// Parse the line-oriented `Key Value` format.
///
/// Blank lines and lines starting with `#` are skipped. Every other line must
/// carry at least two whitespace-separated fields; fields past the second are
/// ignored. The first malformed line aborts parsing with a [`ParseError`].
pub fn parse_config<R: BufRead>(reader: R) -> Result<ConfigMap, ConfigError> {
    let mut config = ConfigMap::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(ConfigError::Read)?;
        let line = line.strip_suffix('\r').unwrap_or(&line);

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some(key), Some(value)) => config.insert(key, value),
            _ => {
                return Err(ParseError {
                    line_number: index + 1,
                    line: line.to_string(),
                }
                .into());
            }
        }
    }

    Ok(config)
}

/// Open `path` and parse it with [`parse_config`]
pub fn parse_config_file<P: AsRef<Path>>(path: P) -> Result<ConfigMap, ConfigError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| ConfigError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(BufReader::new(file))
}
