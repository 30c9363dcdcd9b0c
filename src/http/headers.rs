use crate::base::neterror::NetError;
use http::header::HeaderName;
use std::collections::HashMap;
use std::fmt;

/// One header: the casing it was first seen with, and every value in append order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderEntry {
    key: String,
    display_name: String,
    values: Vec<String>,
}

impl HeaderEntry {
    fn joined(&self) -> String {
        self.values.join(", ")
    }
}

/// Case-insensitive, order-preserving, multi-valued header container.
///
/// Lookups fold the name to lowercase; iteration yields the first-seen
/// casing and the values joined with `", "`, in entry-creation order.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<HeaderEntry>,
}

impl Headers {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Build from any sequence of `(name, value)` pairs, such as a slice of
    /// tuples or a `HashMap`. Repeated names accumulate like [`append`].
    ///
    /// [`append`]: Headers::append
    pub fn try_from_iter<I, K, V>(iter: I) -> Result<Self, NetError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: ToString,
    {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name.as_ref(), value)?;
        }
        Ok(headers)
    }

    /// Add a value, keeping any values already stored under the same name.
    pub fn append(&mut self, name: &str, value: impl ToString) -> Result<(), NetError> {
        let (key, display) = normalize_name(name)?;
        let value = normalize_value(&display, value.to_string())?;

        match self.entries.iter_mut().find(|e| e.key == key) {
            Some(entry) => entry.values.push(value),
            None => self.entries.push(HeaderEntry {
                key,
                display_name: display,
                values: vec![value],
            }),
        }
        Ok(())
    }

    /// Replace every value stored under `name` with `value`.
    pub fn set(&mut self, name: &str, value: impl ToString) -> Result<(), NetError> {
        let (key, display) = normalize_name(name)?;
        let value = normalize_value(&display, value.to_string())?;

        match self.entries.iter_mut().find(|e| e.key == key) {
            Some(entry) => entry.values = vec![value],
            None => self.entries.push(HeaderEntry {
                key,
                display_name: display,
                values: vec![value],
            }),
        }
        Ok(())
    }

    /// The joined value, or `None` if absent.
    pub fn get(&self, name: &str) -> Option<String> {
        self.entry(name).map(HeaderEntry::joined)
    }

    /// Every value stored under `name`, in append order.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.entry(name).map(|e| e.values.as_slice()).unwrap_or(&[])
    }

    pub fn has(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// Remove the entry for `name`. Returns true if something was removed.
    pub fn delete(&mut self, name: &str) -> bool {
        let key = fold(name);
        let before = self.entries.len();
        self.entries.retain(|e| e.key != key);
        self.entries.len() != before
    }

    /// Iterate `(display_name, joined_value)` in entry-creation order.
    ///
    /// Every call starts a fresh iterator.
    pub fn iter(&self) -> impl Iterator<Item = (&str, String)> + '_ {
        self.entries
            .iter()
            .map(|e| (e.display_name.as_str(), e.joined()))
    }

    /// Header names (display casing) in entry-creation order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|e| e.display_name.as_str())
    }

    /// Single-valued plain mapping keyed by display name.
    pub fn to_map(&self) -> HashMap<String, String> {
        self.iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    /// Ordered `(display_name, joined_value)` pairs, as sent to the engine.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, name: &str) -> Option<&HeaderEntry> {
        let key = fold(name);
        self.entries.iter().find(|e| e.key == key)
    }
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl TryFrom<HashMap<String, String>> for Headers {
    type Error = NetError;

    fn try_from(map: HashMap<String, String>) -> Result<Self, Self::Error> {
        Headers::try_from_iter(map)
    }
}

impl TryFrom<Vec<(String, String)>> for Headers {
    type Error = NetError;

    fn try_from(pairs: Vec<(String, String)>) -> Result<Self, Self::Error> {
        Headers::try_from_iter(pairs)
    }
}

impl<const N: usize> TryFrom<[(&str, &str); N]> for Headers {
    type Error = NetError;

    fn try_from(pairs: [(&str, &str); N]) -> Result<Self, Self::Error> {
        Headers::try_from_iter(pairs)
    }
}

fn fold(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Trim, reject empty or non-token names, and return `(lookup_key, display_name)`.
fn normalize_name(name: &str) -> Result<(String, String), NetError> {
    let display = name.trim();
    if display.is_empty() {
        return Err(NetError::EmptyHeaderName);
    }
    let key = display.to_ascii_lowercase();
    HeaderName::from_bytes(key.as_bytes()).map_err(|_| NetError::InvalidHeaderName {
        name: display.to_string(),
    })?;
    Ok((key, display.to_string()))
}

/// Trim surrounding whitespace and reject values that could split the header block.
fn normalize_value(name: &str, value: String) -> Result<String, NetError> {
    let trimmed = value.trim_matches(|c| c == ' ' || c == '\t');
    if trimmed.contains(['\r', '\n', '\0']) {
        return Err(NetError::InvalidHeaderValue {
            name: name.to_string(),
        });
    }
    Ok(trimmed.to_string())
}
