//! Translation of principal-name filters into search queries.

use crate::client::WILDCARD;

/// A filter over principal names that the caller would like evaluated by the service.
///
/// [`NameFilter::to_query`] yields the equivalent [`DirectoryClient::search`] query, or `None`
/// when the service cannot evaluate the filter natively. In that case the caller searches
/// without a query and filters the results itself.
///
/// [`DirectoryClient::search`]: crate::DirectoryClient::search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameFilter {
    /// Name equals the value.
    Equals(String),
    /// Name starts with the value.
    StartsWith(String),
    /// Name ends with the value.
    EndsWith(String),
    /// Name contains the value.
    Contains(String),
    /// Negation of another filter.
    Not(Box<NameFilter>),
}

impl NameFilter {
    /// Wraps `self` in [`NameFilter::Not`].
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Builds the search query for this filter.
    ///
    /// Glob metacharacters in the value are escaped so they match literally. Blank values and
    /// negations have no query form.
    #[must_use]
    pub fn to_query(&self) -> Option<String> {
        let (value, prefix, suffix) = match self {
            Self::Equals(value) => (value, false, false),
            Self::StartsWith(value) => (value, false, true),
            Self::EndsWith(value) => (value, true, false),
            Self::Contains(value) => (value, true, true),
            Self::Not(_) => return None,
        };
        if value.trim().is_empty() {
            return None;
        }

        let mut query = String::with_capacity(value.len() + 2);
        if prefix {
            query.push(WILDCARD);
        }
        for c in value.chars() {
            if matches!(c, '*' | '?' | '[' | '\\') {
                query.push('\\');
            }
            query.push(c);
        }
        if suffix {
            query.push(WILDCARD);
        }
        Some(query)
    }
}
