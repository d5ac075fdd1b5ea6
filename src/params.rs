//! The parameter source the renderer queries for variable values.

use std::collections::HashMap;
use std::fmt;

/// The value of a parameter, as far as the renderer cares: it only ever
/// needs to know whether a value is boolean (for `@IF` presence tests) and
/// what its string form is (for `@VALUE`, `@LOOP` counts, and equality
/// matches).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Value {
    /// The textual form substituted by `@VALUE` and compared against
    /// `@IF(:var = literal)` match values (case-insensitively, by the
    /// caller).
    pub fn as_display(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Str(s) => s.clone(),
        }
    }

    /// `@LOOP`'s count variable, and `@OFFSETFETCH`/`@PAGING`'s offset/fetch
    /// variables, must resolve to an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Str(s) => s.parse().ok(),
            Value::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_display())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// The interface the renderer consumes. Callers implement this against
/// whatever their real parameter store looks like; this crate ships two
/// trivial implementations ([`EmptyParams`] and [`MapParams`]) for the
/// common cases.
pub trait ParamSource {
    fn has_value(&self, name: &str) -> bool;
    fn get_value(&self, name: &str) -> Option<Value>;
}

/// The parameter source used by the no-params `get_sql` overload. Any
/// fragment requiring a variable will fail with `MissingVariable` against
/// this source.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyParams;

impl ParamSource for EmptyParams {
    fn has_value(&self, _name: &str) -> bool {
        false
    }

    fn get_value(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// A `HashMap`-backed parameter source for callers who don't want to
/// implement [`ParamSource`] themselves.
#[derive(Debug, Default, Clone)]
pub struct MapParams(pub HashMap<String, Value>);

impl MapParams {
    pub fn new() -> Self {
        MapParams(HashMap::new())
    }

    pub fn insert(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }
}

impl ParamSource for MapParams {
    fn has_value(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    fn get_value(&self, name: &str) -> Option<Value> {
        self.0.get(name).cloned()
    }
}

impl FromIterator<(String, Value)> for MapParams {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        MapParams(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_params_never_have_values() {
        let p = EmptyParams;
        assert!(!p.has_value("anything"));
        assert_eq!(p.get_value("anything"), None);
    }

    #[test]
    fn map_params_round_trip() {
        let p = MapParams::new().insert("a", "x").insert("n", 3i64);
        assert!(p.has_value("a"));
        assert_eq!(p.get_value("a"), Some(Value::Str("x".into())));
        assert_eq!(p.get_value("n").unwrap().as_int(), Some(3));
        assert!(!p.has_value("missing"));
    }

    #[test]
    fn value_as_int_parses_strings() {
        assert_eq!(Value::from("42").as_int(), Some(42));
        assert_eq!(Value::from("nope").as_int(), None);
        assert_eq!(Value::from(true).as_int(), None);
    }
}
