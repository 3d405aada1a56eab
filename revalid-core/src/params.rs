//! Declared request parameters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::key::encode_component;

/// A single parameter value: either one string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Plain `name=value` parameter.
    Scalar(String),
    /// Repeated parameter, `name[]=a&name[]=b`.
    Array(Vec<String>),
}

impl ParamValue {
    /// Returns every value carried by this parameter.
    pub fn values(&self) -> &[String] {
        match self {
            ParamValue::Scalar(value) => std::slice::from_ref(value),
            ParamValue::Array(values) => values,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Scalar(value.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Scalar(value)
    }
}

impl<S: Into<String>> From<Vec<S>> for ParamValue {
    fn from(values: Vec<S>) -> Self {
        ParamValue::Array(values.into_iter().map(Into::into).collect())
    }
}

/// Declared parameters of a request, ordered by name.
///
/// The ordering makes the parameter set a stable input for cache keys: two
/// requests declaring the same parameters in a different order produce the
/// same key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a parameter.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Looks up a parameter by name.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    /// Iterates parameters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of declared parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` when no parameters are declared.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical text of the parameter set, as hashed into cache keys.
    ///
    /// Scalars render as `name=value` and lists as `name[v1,v2]`, joined by
    /// `&`. Every name and value is url-encoded, so the separators cannot
    /// occur inside them: a scalar named `a[]` never reads like a list named
    /// `a`, and an empty list (`a[]`) is still present.
    pub fn canonical(&self) -> String {
        self.0
            .iter()
            .map(|(name, value)| match value {
                ParamValue::Scalar(value) => {
                    format!("{}={}", encode_component(name), encode_component(value))
                }
                ParamValue::Array(values) => format!(
                    "{}[{}]",
                    encode_component(name),
                    values
                        .iter()
                        .map(|value| encode_component(value))
                        .collect::<Vec<_>>()
                        .join(",")
                ),
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Params(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_canonical_is_sorted_and_encoded() {
        let params = Params::new()
            .with("page", "2")
            .with("color", vec!["red", "dark blue"])
            .with("q", "a&b=c");

        assert_eq!(
            params.canonical(),
            "color[red,dark+blue]&page=2&q=a%26b%3Dc"
        );
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let a: Params = [("b", "2"), ("a", "1")].into_iter().collect();
        let b: Params = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn test_canonical_keeps_shapes_apart() {
        let scalar_named_like_list = Params::new().with("a[]", "x");
        let list = Params::new().with("a", vec!["x"]);
        assert_ne!(scalar_named_like_list.canonical(), list.canonical());

        let scalar = Params::new().with("a", "x,y");
        let pair = Params::new().with("a", vec!["x", "y"]);
        assert_ne!(scalar.canonical(), pair.canonical());

        let empty_list = Params::new().with("a", Vec::<String>::new());
        assert_eq!(empty_list.canonical(), "a[]");
        assert_ne!(empty_list.canonical(), Params::new().canonical());
    }
}
