//! Short element references (`e1`, `ref=e1`, `[ref=e1]`) handed out by
//! discovery so tool callers don't have to echo long selectors back.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefError {
    #[error("Invalid ref '{0}'. Use ref=eN, [ref=eN], or eN.")]
    InvalidFormat(String),
    #[error("Ref '{0}' not found, run discovery again.")]
    NotFound(String),
}

fn is_valid_ref_token(token: &str) -> bool {
    token
        .strip_prefix('e')
        .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
}

pub fn parse_ref(selector: &str) -> Option<&str> {
    let trimmed = selector.trim();
    let token = if let Some(inner) = trimmed.strip_prefix("[ref=") {
        inner.strip_suffix(']')?
    } else if let Some(inner) = trimmed.strip_prefix("ref=") {
        inner
    } else {
        trimmed
    };
    is_valid_ref_token(token).then_some(token)
}

/// Ref → selector table, rebuilt on every discovery pass.
#[derive(Debug, Clone, Default)]
pub struct RefTable {
    refs: HashMap<String, String>,
}

impl RefTable {
    /// Number the selectors `e1..eN` in order.
    pub fn assign<I, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let refs = selectors
            .into_iter()
            .enumerate()
            .map(|(i, s)| (format!("e{}", i + 1), s.into()))
            .collect();
        Self { refs }
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Turn a ref into its selector; anything that isn't ref-shaped passes through.
    pub fn resolve(&self, selector: &str) -> Result<String, RefError> {
        let trimmed = selector.trim();
        if let Some(token) = parse_ref(trimmed) {
            return self
                .refs
                .get(token)
                .cloned()
                .ok_or_else(|| RefError::NotFound(token.to_string()));
        }
        if trimmed.starts_with("ref=") || trimmed.starts_with("[ref=") {
            return Err(RefError::InvalidFormat(trimmed.to_string()));
        }
        Ok(selector.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ref_supported_formats() {
        assert_eq!(parse_ref("e12"), Some("e12"));
        assert_eq!(parse_ref("ref=e12"), Some("e12"));
        assert_eq!(parse_ref("[ref=e12]"), Some("e12"));
        assert_eq!(parse_ref("ref=foo"), None);
        assert_eq!(parse_ref("e"), None);
    }

    #[test]
    fn test_table_numbers_from_one() {
        let table = RefTable::assign(["#cta", "nav > a.link"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.resolve("e2").unwrap(), "nav > a.link");
        assert_eq!(table.resolve("[ref=e1]").unwrap(), "#cta");
    }

    #[test]
    fn test_css_passes_through_and_stale_refs_error() {
        let table = RefTable::assign(["#cta"]);
        assert_eq!(table.resolve("#login-form").unwrap(), "#login-form");
        assert_eq!(table.resolve("e7"), Err(RefError::NotFound("e7".into())));
        assert_eq!(
            table.resolve("ref=foo"),
            Err(RefError::InvalidFormat("ref=foo".into()))
        );
    }
}
