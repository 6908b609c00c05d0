//! Ordered query parameters

/// Query parameters in insertion order
///
/// An empty value denotes a bare parameter such as `?uploads`. Names keep the
/// caller's spelling; inserting an existing name replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams {
    params: Vec<(String, String)>,
}

impl QueryParams {
    /// Create an empty parameter list
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.params.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.params.push((name, value)),
        }
    }

    /// Set a bare parameter (no value)
    pub fn insert_flag(&mut self, name: impl Into<String>) {
        self.insert(name, String::new());
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Builder-style bare parameter
    pub fn with_flag(mut self, name: impl Into<String>) -> Self {
        self.insert_flag(name);
        self
    }

    /// Get a parameter value by exact name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate `(name, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Check if there are no parameters
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Render as a percent-encoded query string without the leading `?`
    ///
    /// Bare parameters render as their name only.
    pub fn to_query_string(&self) -> String {
        let mut out = String::with_capacity(self.params.len() * 32);
        for (i, (name, value)) in self.params.iter().enumerate() {
            if i > 0 {
                out.push('&');
            }
            out.push_str(&urlencoding::encode(name));
            if !value.is_empty() {
                out.push('=');
                out.push_str(&urlencoding::encode(value));
            }
        }
        out
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut query = Self::new();
        for (name, value) in iter {
            query.insert(name, value);
        }
        query
    }
}
