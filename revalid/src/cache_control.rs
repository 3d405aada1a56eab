use std::fmt;
use std::time::Duration;

use http::HeaderValue;

/// Value of a single `Cache-Control` directive as configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveValue {
    /// `true` emits the bare directive name, `false` omits the directive.
    Flag(bool),
    /// Emitted as `name=value`.
    Value(String),
}

impl From<bool> for DirectiveValue {
    fn from(flag: bool) -> Self {
        Self::Flag(flag)
    }
}

impl From<&str> for DirectiveValue {
    fn from(value: &str) -> Self {
        Self::Value(value.to_owned())
    }
}

impl From<String> for DirectiveValue {
    fn from(value: String) -> Self {
        Self::Value(value)
    }
}

impl From<u64> for DirectiveValue {
    fn from(value: u64) -> Self {
        Self::Value(value.to_string())
    }
}

/// Normalized `Cache-Control` directive set.
///
/// Every configuration shape (one name, a list of names, name/value pairs)
/// ends up as the same ordered list of `(name, Option<value>)`. Names are
/// lower-cased. Insertion order is kept, and setting a name that is already
/// present replaces it in place.
///
/// ```
/// use revalid::{CacheControl, DirectiveValue};
///
/// let directives = CacheControl::pairs([
///     ("public", DirectiveValue::Flag(true)),
///     ("s-maxage", DirectiveValue::from(600u64)),
/// ])
///     .with("no-transform", true)
///     .with("public", false);
/// assert_eq!(directives.to_string(), "s-maxage=600, no-transform");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheControl {
    directives: Vec<(String, Option<String>)>,
}

impl CacheControl {
    /// An empty directive set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag-only directives, in the given order.
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .fold(Self::new(), |directives, name| directives.with(name.as_ref(), true))
    }

    /// Directives from `(name, value)` pairs, in the given order.
    pub fn pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, DirectiveValue)>,
        S: AsRef<str>,
    {
        pairs
            .into_iter()
            .fold(Self::new(), |directives, (name, value)| {
                directives.with(name.as_ref(), value)
            })
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, name: &str, value: impl Into<DirectiveValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets a directive. `Flag(false)` removes it.
    pub fn set(&mut self, name: &str, value: impl Into<DirectiveValue>) {
        let name = name.trim().to_ascii_lowercase();
        let value = match value.into() {
            DirectiveValue::Flag(false) => {
                self.directives.retain(|(existing, _)| *existing != name);
                return;
            }
            DirectiveValue::Flag(true) => None,
            DirectiveValue::Value(value) => Some(value),
        };

        match self.directives.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.directives.push((name, value)),
        }
    }

    /// `true` when the directive is present.
    pub fn contains(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.directives.iter().any(|(existing, _)| *existing == name)
    }

    /// Value of a directive: `Some(None)` for a flag, `None` when absent.
    pub fn get(&self, name: &str) -> Option<Option<&str>> {
        let name = name.to_ascii_lowercase();
        self.directives
            .iter()
            .find(|(existing, _)| *existing == name)
            .map(|(_, value)| value.as_deref())
    }

    /// Appends `max-age=<secs>` unless a `max-age` is already set.
    pub fn inject_max_age(&mut self, max_age: Duration) {
        if !self.contains("max-age") {
            self.directives
                .push(("max-age".to_owned(), Some(max_age.as_secs().to_string())));
        }
    }

    /// `true` when there is nothing to emit.
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Directives in emission order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.directives
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }

    /// Header value, `None` when empty or not a valid header value.
    pub fn to_header_value(&self) -> Option<HeaderValue> {
        if self.is_empty() {
            return None;
        }
        HeaderValue::from_str(&self.to_string()).ok()
    }
}

impl From<&str> for CacheControl {
    fn from(name: &str) -> Self {
        Self::new().with(name, true)
    }
}

impl fmt::Display for CacheControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (name, value)) in self.directives.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            match value {
                Some(value) => write!(f, "{name}={value}")?,
                None => f.write_str(name)?,
            }
        }
        Ok(())
    }
}
