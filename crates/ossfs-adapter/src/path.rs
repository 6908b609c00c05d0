//! Mapping between caller paths and prefixed object keys

const SEPARATORS: &[char] = &['/', '\\'];

/// Prepends a fixed prefix to paths and strips it from listed keys
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathPrefixer {
    prefix: String,
}

impl PathPrefixer {
    /// An empty or root (`/`) prefix leaves paths untouched; anything else
    /// gains one trailing `/`.
    pub fn new(prefix: &str) -> Self {
        let mut trimmed = prefix.trim_end_matches(SEPARATORS).to_string();
        if !trimmed.is_empty() {
            trimmed.push('/');
        }
        Self { prefix: trimmed }
    }

    /// The normalized prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Object key of a file path
    pub fn prefix_path(&self, path: &str) -> String {
        format!("{}{}", self.prefix, path.trim_start_matches(SEPARATORS))
    }

    /// Listing prefix of a directory path, ending in `/` unless empty
    pub fn prefix_directory_path(&self, path: &str) -> String {
        let mut prefixed = self.prefix_path(path.trim_end_matches(SEPARATORS));
        if !prefixed.is_empty() && !prefixed.ends_with('/') {
            prefixed.push('/');
        }
        prefixed
    }

    /// Caller path of an object key
    pub fn strip_prefix<'a>(&self, key: &'a str) -> &'a str {
        key.strip_prefix(self.prefix.as_str()).unwrap_or(key)
    }

    /// Caller path of a common prefix, without the trailing separator
    pub fn strip_directory_prefix<'a>(&self, key: &'a str) -> &'a str {
        self.strip_prefix(key).trim_end_matches(SEPARATORS)
    }
}
