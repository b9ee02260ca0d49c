use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A mapping node: string keys to values.
pub type Mapping = BTreeMap<String, Value>;

/// A zero-argument callable standing in for a lazily computed value.
///
/// Thunks may return other thunks; [`Value::force`] keeps invoking until a
/// concrete value comes back.
#[derive(Clone)]
pub struct Thunk(Arc<dyn Fn() -> Value + Send + Sync>);

impl Thunk {
    pub fn new(f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        Thunk(Arc::new(f))
    }

    pub fn call(&self) -> Value {
        (self.0)()
    }
}

impl fmt::Debug for Thunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Thunk")
    }
}

impl PartialEq for Thunk {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A node in a value tree.
///
/// "undefined" has no variant: absent values are `Option::None` wherever a
/// lookup can miss.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Mapping(Mapping),
    Sequence(Vec<Value>),
    Thunk(Thunk),
}

impl Value {
    /// An empty mapping.
    pub fn mapping() -> Self {
        Value::Mapping(Mapping::new())
    }

    /// Wrap a closure as a thunk value.
    pub fn thunk(f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        Value::Thunk(Thunk::new(f))
    }

    /// Invoke thunks until a non-thunk value is produced.
    pub fn force(self) -> Value {
        let mut value = self;
        while let Value::Thunk(thunk) = value {
            value = thunk.call();
        }
        value
    }

    /// Force a thunk stored in this slot, replacing it with its result.
    pub fn force_in_place(&mut self) -> &mut Value {
        if self.is_thunk() {
            let forced = std::mem::take(self).force();
            *self = forced;
        }
        self
    }

    pub fn is_thunk(&self) -> bool {
        matches!(self, Value::Thunk(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Get a property of a mapping node.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_mapping().and_then(|m| m.get(key))
    }

    /// Truthiness as the host scripting layer sees it.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Mapping(_) | Value::Sequence(_) | Value::Thunk(_) => true,
        }
    }

    /// The text a value turns into when spliced into a string.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Mapping(_) => "[object Object]".to_string(),
            Value::Sequence(items) => items
                .iter()
                .map(|item| match item {
                    Value::Null => String::new(),
                    other => other.to_display_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Thunk(thunk) => thunk.call().force().to_display_string(),
        }
    }
}

/// Display form of an optional value; a miss renders as `undefined`.
pub fn display_or_undefined(value: Option<&Value>) -> String {
    match value {
        Some(v) => v.to_display_string(),
        None => "undefined".to_string(),
    }
}

/// Format a number the way the scripting host does: integers without a
/// decimal point, exponent notation from 1e21 up and below 1e-6.
pub fn format_number(n: f64) -> String {
    // Must be finite, integral, and within the range where f64 can
    // represent every integer exactly (2^53).
    if n.is_finite() && n.fract() == 0.0 && n.abs() < (1u64 << 53) as f64 {
        format!("{}", n as i64)
    } else if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.abs() >= 1e21 || n.abs() < 1e-6 {
        let text = format!("{:e}", n);
        match text.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => text,
        }
    } else {
        format!("{}", n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Mapping> for Value {
    fn from(m: Mapping) -> Self {
        Value::Mapping(m)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(items)
    }
}
