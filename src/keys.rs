//! Key naming
//!
//! Deterministic mapping from `(namespace, group, name)` to store keys.
//!
//! ```text
//! content:  /xconf/<namespace>/<group>/<name>
//! metadata: /xconf/<namespace>/<group>/<name>.metadata
//! ```

/// Product name; first segment of every store key and of the cache layout
pub const PRODUCT_NAME: &str = "xconf";

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "x";

/// Suffix appended to a content key to form its metadata key
pub const METADATA_SUFFIX: &str = ".metadata";

/// Builds store keys for one namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNamer {
    prefix: String,
}

impl KeyNamer {
    /// Create a namer for `namespace` (empty selects the default namespace)
    pub fn new(namespace: &str) -> Self {
        let namespace = if namespace.is_empty() {
            DEFAULT_NAMESPACE
        } else {
            namespace
        };
        Self {
            prefix: format!("/{}/{}/", PRODUCT_NAME, namespace),
        }
    }

    /// Key holding a file's content
    pub fn content_key(&self, group: &str, name: &str) -> String {
        let mut key = String::with_capacity(self.prefix.len() + group.len() + name.len() + 1);
        key.push_str(&self.prefix);
        key.push_str(group);
        key.push('/');
        key.push_str(name);
        key
    }

    /// Key holding a file's metadata record
    pub fn metadata_key(&self, group: &str, name: &str) -> String {
        Self::metadata_key_for(&self.content_key(group, name))
    }

    /// Derive the metadata key from an existing content key
    pub fn metadata_key_for(content_key: &str) -> String {
        format!("{}{}", content_key, METADATA_SUFFIX)
    }

    /// The namespace prefix, including the trailing slash
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}
