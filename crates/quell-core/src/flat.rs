//! Order-independent stringification of flat key/value objects.
//!
//! Used to derive a stable hash key from query parameters: two objects with
//! the same key→value mapping produce the same string no matter in which
//! order their keys were inserted.
//!
//! # Format
//!
//! Objects and arrays render as compact JSON with object keys sorted.
//! Members whose value is [`FlatValue::Undefined`] are skipped. Inside
//! arrays, `Undefined` and non-finite numbers render as `null`. Other
//! primitives render as their plain string form (`undefined`, `null`,
//! `true`, `42`, or the string itself).
//!
//! Numbers use JavaScript's number-to-string rules everywhere: integral
//! values below 1e21 print all their digits (`10000000000000000`), values
//! down to 1e-6 print in positional form (`0.000001`), and anything else
//! uses an explicit exponent sign (`1e+21`, `1e-7`).

use std::fmt::Write as _;

use serde_json::Value;

/// A primitive, or an array of primitives, stored in a [`FlatObject`].
#[derive(Debug, Clone, PartialEq)]
pub enum FlatValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Arrays may only hold primitives; nested arrays are rendered but not
    /// guaranteed to be stable across implementations.
    Array(Vec<FlatValue>),
}

impl From<bool> for FlatValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for FlatValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i32> for FlatValue {
    fn from(v: i32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<u32> for FlatValue {
    fn from(v: u32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<&str> for FlatValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for FlatValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl<T: Into<FlatValue>> From<Option<T>> for FlatValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<FlatValue>> From<Vec<T>> for FlatValue {
    fn from(v: Vec<T>) -> Self {
        Self::Array(v.into_iter().map(Into::into).collect())
    }
}

/// A flat object: string keys mapped to primitives or primitive arrays.
///
/// Keeps insertion order; inserting an existing key replaces its value in
/// place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatObject {
    entries: Vec<(String, FlatValue)>,
}

impl FlatObject {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FlatValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FlatValue>) -> Self {
        self.insert(key, value);
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FlatValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlatValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<FlatValue>> FromIterator<(K, V)> for FlatObject {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut obj = Self::new();
        for (k, v) in iter {
            obj.insert(k, v);
        }
        obj
    }
}

/// Input accepted by [`stringify_flat_object`].
#[derive(Debug, Clone, PartialEq)]
pub enum FlatInput {
    Object(FlatObject),
    Primitive(FlatValue),
}

impl From<FlatObject> for FlatInput {
    fn from(obj: FlatObject) -> Self {
        Self::Object(obj)
    }
}

impl From<FlatValue> for FlatInput {
    fn from(v: FlatValue) -> Self {
        Self::Primitive(v)
    }
}

/// Stringify `input` so that key order does not matter.
///
/// ```
/// use quell_core::flat::{FlatObject, FlatValue, stringify_flat_object};
///
/// let a = FlatObject::new().with("page", 2).with("q", "rust");
/// let b = FlatObject::new().with("q", "rust").with("page", 2);
/// assert_eq!(stringify_flat_object(&a.into()), r#"{"page":2,"q":"rust"}"#);
/// assert_eq!(stringify_flat_object(&b.into()), r#"{"page":2,"q":"rust"}"#);
/// assert_eq!(stringify_flat_object(&FlatValue::Null.into()), "null");
/// ```
#[must_use]
pub fn stringify_flat_object(input: &FlatInput) -> String {
    match input {
        FlatInput::Object(obj) => stringify_object(obj),
        FlatInput::Primitive(value) => primitive_to_string(value),
    }
}

fn stringify_object(obj: &FlatObject) -> String {
    let mut members: Vec<(&str, &FlatValue)> = obj
        .iter()
        .filter(|(_, v)| !matches!(v, FlatValue::Undefined))
        .collect();
    members.sort_unstable_by(|a, b| a.0.cmp(b.0));

    let mut out = String::from("{");
    for (i, (key, value)) in members.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        // Writing into a String cannot fail.
        let _ = write!(out, "{}:", Value::from(key));
        write_json(&mut out, value);
    }
    out.push('}');
    out
}

fn write_json(out: &mut String, value: &FlatValue) {
    match value {
        FlatValue::Undefined | FlatValue::Null => out.push_str("null"),
        FlatValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        FlatValue::Number(n) if n.is_finite() => out.push_str(&format_number(*n)),
        FlatValue::Number(_) => out.push_str("null"),
        FlatValue::String(s) => {
            let _ = write!(out, "{}", Value::from(s.as_str()));
        }
        FlatValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json(out, item);
            }
            out.push(']');
        }
    }
}

/// Format a finite number with JavaScript's `Number#toString` rules.
fn format_number(n: f64) -> String {
    if n == 0.0 {
        // Also folds -0.0 into 0.
        return "0".to_owned();
    }
    if n < 0.0 {
        return format!("-{}", format_number(-n));
    }

    // Shortest round-trip digits, e.g. "1.2345e2".
    let scientific = format!("{n:e}");
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let len = digits.len() as i32;
    // Position of the decimal point relative to the first digit.
    let point = exponent + 1;

    if len <= point && point <= 21 {
        format!("{digits}{}", "0".repeat((point - len) as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        format!("{int}.{frac}")
    } else if -6 < point && point <= 0 {
        format!("0.{}{digits}", "0".repeat(point.unsigned_abs() as usize))
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        let magnitude = exponent.unsigned_abs();
        match digits.split_at(1) {
            (first, "") => format!("{first}e{sign}{magnitude}"),
            (first, rest) => format!("{first}.{rest}e{sign}{magnitude}"),
        }
    }
}

fn primitive_to_string(value: &FlatValue) -> String {
    match value {
        FlatValue::Undefined => "undefined".to_owned(),
        FlatValue::Null => "null".to_owned(),
        FlatValue::Bool(b) => b.to_string(),
        FlatValue::Number(n) if n.is_nan() => "NaN".to_owned(),
        FlatValue::Number(n) if n.is_infinite() => {
            let text = if n.is_sign_positive() { "Infinity" } else { "-Infinity" };
            text.to_owned()
        }
        FlatValue::Number(n) => format_number(*n),
        FlatValue::String(s) => s.clone(),
        FlatValue::Array(_) => {
            let mut out = String::new();
            write_json(&mut out, value);
            out
        }
    }
}
