//! Entity tags (RFC 7232 §2.3) and `If-None-Match` evaluation.

use std::fmt;

use sha2::{Digest, Sha256};

/// A response entity tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTag {
    opaque: String,
    weak: bool,
}

impl EntityTag {
    /// A strong tag with the given opaque value.
    pub fn strong(opaque: impl Into<String>) -> Self {
        Self {
            opaque: opaque.into(),
            weak: false,
        }
    }

    /// A weak tag with the given opaque value.
    pub fn weak(opaque: impl Into<String>) -> Self {
        Self {
            opaque: opaque.into(),
            weak: true,
        }
    }

    /// Builds the tag a policy emits for a resolved value.
    ///
    /// With `hash` the opaque part is the SHA-256 hex digest of `raw`.
    /// Surrounding quotes in `raw` are not doubled.
    pub fn from_resolved(raw: &str, weak: bool, hash: bool) -> Self {
        let opaque = if hash {
            hex::encode(Sha256::digest(raw.as_bytes()))
        } else {
            unquote(raw).to_owned()
        };
        Self { opaque, weak }
    }

    /// Parses a single header-form tag such as `W/"abc"`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let (weak, rest) = match value.strip_prefix("W/") {
            Some(rest) => (true, rest),
            None => (false, value),
        };
        let opaque = rest.strip_prefix('"')?.strip_suffix('"')?;
        Some(Self {
            opaque: opaque.to_owned(),
            weak,
        })
    }

    /// Opaque value without quotes.
    pub fn opaque(&self) -> &str {
        &self.opaque
    }

    /// `true` for `W/` tags.
    pub fn is_weak(&self) -> bool {
        self.weak
    }

    /// Weak comparison: opaque values are equal, weakness ignored.
    pub fn weak_eq(&self, other: &Self) -> bool {
        self.opaque == other.opaque
    }

    /// `true` when an `If-None-Match` value selects this tag.
    ///
    /// `*` matches any tag. Otherwise the comma-separated list is compared
    /// with the weak comparison function.
    pub fn matches_if_none_match(&self, header: &str) -> bool {
        if header.trim() == "*" {
            return true;
        }
        parse_list(header).iter().any(|tag| tag.weak_eq(self))
    }
}

impl fmt::Display for EntityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.weak {
            f.write_str("W/")?;
        }
        write!(f, "\"{}\"", self.opaque)
    }
}

fn unquote(raw: &str) -> &str {
    raw.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(raw)
}

/// Splits an entity-tag list. Commas inside quotes do not split.
fn parse_list(header: &str) -> Vec<EntityTag> {
    let mut tags = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (index, ch) in header.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            ',' if !quoted => {
                tags.extend(EntityTag::parse(&header[start..index]));
                start = index + 1;
            }
            _ => {}
        }
    }
    tags.extend(EntityTag::parse(&header[start..]));
    tags
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(EntityTag::strong("abc").to_string(), "\"abc\"");
        assert_eq!(EntityTag::weak("abc").to_string(), "W/\"abc\"");
    }

    #[test]
    fn test_from_resolved_quotes_once() {
        assert_eq!(EntityTag::from_resolved("abc", false, false).to_string(), "\"abc\"");
        assert_eq!(EntityTag::from_resolved("\"abc\"", false, false).to_string(), "\"abc\"");
        assert_eq!(EntityTag::from_resolved("abc", true, false).to_string(), "W/\"abc\"");
    }

    #[test]
    fn test_from_resolved_hashes() {
        let tag = EntityTag::from_resolved("abc", false, true);
        assert_eq!(
            tag.opaque(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!(EntityTag::parse(" W/\"x\" "), Some(EntityTag::weak("x")));
        assert_eq!(EntityTag::parse("\"x\""), Some(EntityTag::strong("x")));
        assert_eq!(EntityTag::parse("x"), None);
    }

    #[test]
    fn test_if_none_match_exact() {
        assert!(EntityTag::strong("abc").matches_if_none_match("\"abc\""));
        assert!(!EntityTag::strong("abc").matches_if_none_match("\"abd\""));
    }

    #[test]
    fn test_if_none_match_is_weak_comparison() {
        assert!(EntityTag::strong("abc").matches_if_none_match("W/\"abc\""));
        assert!(EntityTag::weak("abc").matches_if_none_match("\"abc\""));
    }

    #[test]
    fn test_if_none_match_list() {
        let tag = EntityTag::strong("b");
        assert!(tag.matches_if_none_match("\"a\", W/\"b\", \"c\""));
        assert!(!tag.matches_if_none_match("\"a\",\"c\""));
    }

    #[test]
    fn test_if_none_match_star() {
        assert!(EntityTag::weak("anything").matches_if_none_match(" * "));
    }

    #[test]
    fn test_comma_inside_tag() {
        let tag = EntityTag::strong("a,b");
        assert!(tag.matches_if_none_match("\"x\", \"a,b\""));
        assert!(!EntityTag::strong("a").matches_if_none_match("\"a,b\""));
    }
}
