use crate::host::HostHeaders;

/// Separator used when flattening a multi-valued header into one host value.
pub const VALUE_SEPARATOR: &str = "; ";

/// A header name with every value appended under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub values: Vec<String>,
}

/// An ordered header multi-map.
///
/// Names compare case-insensitively; the casing of the first insertion is
/// kept. Values under one name stay in append order, and names stay in
/// first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<Header>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|h| h.name.eq_ignore_ascii_case(name))
    }

    /// Add a value under `name`, keeping any existing values.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx].values.push(value.into()),
            None => self.entries.push(Header {
                name,
                values: vec![value.into()],
            }),
        }
    }

    /// Replace every value under `name` with `value`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx].values = vec![value.into()],
            None => self.entries.push(Header {
                name,
                values: vec![value.into()],
            }),
        }
    }

    /// Get the first value under `name` (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name)
            .and_then(|idx| self.entries[idx].values.first())
            .map(String::as_str)
    }

    /// Get all values under `name` (case-insensitive).
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.position(name)
            .map(|idx| self.entries[idx].values.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.entries.iter()
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut map = HeaderMap::new();
        for (name, value) in iter {
            map.append(name, value);
        }
        map
    }
}

/// Build a [`HeaderMap`] from the host's header pairs, appending every pair.
pub fn to_internal(pairs: impl IntoIterator<Item = (String, String)>) -> HeaderMap {
    pairs.into_iter().collect()
}

/// Build the host header object: one `append` per name, with multiple
/// values joined by [`VALUE_SEPARATOR`].
///
/// The join is lossy for values that themselves contain the separator;
/// hosts expect exactly this flattening.
pub fn to_host(headers: &HeaderMap) -> HostHeaders {
    let mut host = HostHeaders::new();
    for header in headers.iter() {
        host.append(header.name.clone(), header.values.join(VALUE_SEPARATOR));
    }
    host
}
