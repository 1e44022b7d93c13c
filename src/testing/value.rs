use std::fmt;
use std::hash::{Hash, Hasher};

/// The closed set of argument and return value representations understood
/// by the engine.
///
/// Adapters translate their typed operations into these variants instead of
/// erasing them behind raw pointers. Equality is strict: values of different
/// variants never compare equal, so an `Int` result can never be mistaken
/// for a `Bool` even when the bit patterns would match.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Text(String),
    Maybe(Option<Box<Value>>),
}

impl Value {
    /// Wrap a value in a present `Maybe`.
    pub fn some(val: Value) -> Value {
        Value::Maybe(Some(Box::new(val)))
    }

    /// An absent `Maybe`.
    pub fn none() -> Value {
        Value::Maybe(None)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(val) => Some(*val),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(val) => Some(*val),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(val) => Some(val),
            _ => None,
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Value {
        Value::Unit
    }
}

impl From<bool> for Value {
    fn from(val: bool) -> Value {
        Value::Bool(val)
    }
}

impl From<i64> for Value {
    fn from(val: i64) -> Value {
        Value::Int(val)
    }
}

impl From<String> for Value {
    fn from(val: String) -> Value {
        Value::Text(val)
    }
}

impl From<&str> for Value {
    fn from(val: &str) -> Value {
        Value::Text(val.to_owned())
    }
}

impl From<Option<i64>> for Value {
    fn from(val: Option<i64>) -> Value {
        match val {
            Some(inner) => Value::some(Value::Int(inner)),
            None => Value::none(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "void"),
            Value::Bool(val) => write!(f, "{}", val),
            Value::Int(val) => write!(f, "{}", val),
            Value::Text(val) => write!(f, "{}", val),
            Value::Maybe(Some(val)) => write!(f, "{}", val),
            Value::Maybe(None) => write!(f, "null"),
        }
    }
}

/// The result of invoking one actor: either a returned [`Value`] or a
/// recorded failure.
///
/// Two `Failed` outcomes compare equal regardless of their messages:
/// verification cares about the kind of result, not the failure text.
/// The `Hash` implementation is consistent with that equality.
#[derive(Clone, Debug)]
pub enum Outcome {
    Returned(Value),
    Failed(String),
}

impl PartialEq for Outcome {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Outcome::Returned(a), Outcome::Returned(b)) => a == b,
            (Outcome::Failed(_), Outcome::Failed(_)) => true,
            _ => false,
        }
    }
}

impl Eq for Outcome {}

impl Hash for Outcome {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Outcome::Returned(val) => {
                0u8.hash(state);
                val.hash(state);
            }
            // Message is excluded so that hashing agrees with equality.
            Outcome::Failed(_) => 1u8.hash(state),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Outcome::Returned(val) => write!(f, "{}", val),
            Outcome::Failed(message) => write!(f, "failed: {}", message),
        }
    }
}
