use serde::Serialize;
use std::collections::BTreeMap;

/// Files containing a task marker, keyed by their path.
///
/// Keys are unique within one run. When a path is inserted twice, the second
/// entry is stored under `path#2`, the third under `path#3`, and so on, so no
/// entry is ever dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TodoMap {
    entries: BTreeMap<String, String>,
}

impl TodoMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `content` under `path`, or under the first free `path#N`.
    ///
    /// Returns the key that was actually used.
    pub fn insert_unique(&mut self, path: &str, content: String) -> String {
        let mut key = path.to_string();
        let mut counter = 1;
        while self.entries.contains_key(&key) {
            counter += 1;
            key = format!("{}#{}", path, counter);
        }
        self.entries.insert(key.clone(), content);
        key
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Applies `f` to every content value, keeping the keys.
    pub fn map_contents<F>(&self, f: F) -> TodoMap
    where
        F: Fn(&str) -> String,
    {
        TodoMap {
            entries: self
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), f(v)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_unique_suffixes_collisions() {
        let mut map = TodoMap::new();
        assert_eq!(map.insert_unique("/p/a.go", "one".to_string()), "/p/a.go");
        assert_eq!(map.insert_unique("/p/a.go", "two".to_string()), "/p/a.go#2");
        assert_eq!(map.insert_unique("/p/a.go", "three".to_string()), "/p/a.go#3");

        assert_eq!(map.len(), 3);
        assert_eq!(map.get("/p/a.go"), Some("one"));
        assert_eq!(map.get("/p/a.go#2"), Some("two"));
        assert_eq!(map.get("/p/a.go#3"), Some("three"));
    }

    #[test]
    fn test_suffix_skips_taken_keys() {
        let mut map = TodoMap::new();
        map.insert_unique("/p/a.go#2", "literal".to_string());
        map.insert_unique("/p/a.go", "first".to_string());
        let key = map.insert_unique("/p/a.go", "second".to_string());

        assert_eq!(key, "/p/a.go#3");
        assert_eq!(map.get("/p/a.go#2"), Some("literal"));
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let mut map = TodoMap::new();
        map.insert_unique("/p/a.go", "x".to_string());
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"/p/a.go":"x"}"#);
    }

    #[test]
    fn test_map_contents_keeps_keys() {
        let mut map = TodoMap::new();
        map.insert_unique("/p/a.go", "abc".to_string());
        let upper = map.map_contents(|c| c.to_uppercase());
        assert_eq!(upper.get("/p/a.go"), Some("ABC"));
    }
}
