// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use std::fmt;

//==============================================================================
// Constants & Structures
//==============================================================================

/// HTTP header map. Lookups ignore ASCII case; iteration yields entries in
/// insertion order, which is also the order they are serialized in. Inserting
/// under an already-present name replaces the stored entry, keeping the
/// casing of the last writer.
#[derive(Clone, Default)]
pub struct Headers {
    repr: Vec<(String, String)>,
}

//==============================================================================
// Associate Functions
//==============================================================================

/// Associate functions for [Headers].
impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self { repr: Vec::new() }
    }

    /// Inserts a header, overwriting any entry stored under the same name in
    /// any casing.
    pub fn insert<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let key = key.into();
        let value = value.into();
        match self
            .repr
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            Some(entry) => {
                entry.0 = key;
                entry.1 = value;
            }
            None => self.repr.push((key, value)),
        }
    }

    /// Looks up a header value by name, ignoring ASCII case.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.repr
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Checks whether a header is present, ignoring ASCII case.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterates over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.repr.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of stored headers.
    pub fn len(&self) -> usize {
        self.repr.len()
    }

    /// Checks whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.repr.is_empty()
    }
}

//==============================================================================
// Trait Implementations
//==============================================================================

/// Debug trait implementation for [Headers].
impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map()
            .entries(self.repr.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

//==============================================================================
// Unit Tests
//==============================================================================

#[cfg(test)]
mod tests {
    use super::Headers;

    /// Tests that lookups ignore ASCII case.
    #[test]
    fn case_insensitive_lookup() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "text/plain");

        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));
        assert!(headers.contains("cOnTeNt-TyPe"));
        assert_eq!(headers.get("Content-Length"), None);
    }

    /// Tests that inserting under an existing name in a different casing
    /// replaces the entry and keeps the last-written casing.
    #[test]
    fn last_writer_wins() {
        let mut headers = Headers::new();
        headers.insert("Host", "alpha");
        headers.insert("HOST", "beta");

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("host"), Some("beta"));
        assert_eq!(headers.iter().next(), Some(("HOST", "beta")));
    }

    /// Tests that iteration preserves insertion order.
    #[test]
    fn insertion_order() {
        let mut headers = Headers::new();
        headers.insert("A", "1");
        headers.insert("B", "2");
        headers.insert("C", "3");
        headers.insert("b", "4");

        let entries: Vec<(&str, &str)> = headers.iter().collect();
        assert_eq!(entries, vec![("A", "1"), ("b", "4"), ("C", "3")]);
    }
}
