use std::fmt;

use bookshelf_kernel::BookId;

const BOOKS: &str = "books";

/// Composite cache key such as `["books"]` or `["books", "42"]`.
///
/// Invalidation matches by prefix, so `["books"]` covers every book key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// `["books"]`
    pub fn books() -> Self {
        Self::new([BOOKS])
    }

    /// `["books", id]`
    pub fn book(id: &BookId) -> Self {
        Self::new([BOOKS, id.as_str()])
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (index, segment) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{segment:?}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_keys_extend_the_collection_key() {
        let item = QueryKey::book(&BookId::from("42"));
        assert_eq!(item.segments(), ["books", "42"]);
        assert!(item.starts_with(&QueryKey::books()));
        assert!(!QueryKey::books().starts_with(&item));
        assert!(QueryKey::books().starts_with(&QueryKey::books()));
    }

    #[test]
    fn unrelated_prefix_does_not_match() {
        let authors = QueryKey::new(["authors"]);
        assert!(!QueryKey::book(&BookId::from("1")).starts_with(&authors));
        assert!(QueryKey::books().starts_with(&QueryKey::new(Vec::<String>::new())));
    }

    #[test]
    fn display_looks_like_a_json_array() {
        assert_eq!(QueryKey::books().to_string(), r#"["books"]"#);
        assert_eq!(
            QueryKey::book(&BookId::from("7")).to_string(),
            r#"["books","7"]"#
        );
    }
}
