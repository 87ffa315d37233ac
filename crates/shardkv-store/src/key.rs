use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A scalar key — the source's `Union[int, float, str]`.
///
/// Stored keyed in a `BTreeMap`, so `Key` needs a total order; floats don't
/// have one natively, hence the manual `Ord` via `f64::total_cmp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Key {
    /// Builds the composite string `"{index}:{key}"` used as the hashing
    /// input for bucket assignment.
    pub fn composite(&self, index: &str) -> String {
        format!("{index}:{self}")
    }

    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::String(s) => Some(Key::Str(s.clone())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Key::Int(i))
                } else {
                    n.as_f64().map(Key::Float)
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(i) => write!(f, "{i}"),
            Key::Float(v) => write!(f, "{v}"),
            Key::Str(s) => write!(f, "{s}"),
        }
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        // Order first by variant (a stable, arbitrary but total order across
        // types), then by value within a variant.
        fn rank(k: &Key) -> u8 {
            match k {
                Key::Int(_) => 0,
                Key::Float(_) => 1,
                Key::Str(_) => 2,
            }
        }
        match (self, other) {
            (Key::Int(a), Key::Int(b)) => a.cmp(b),
            (Key::Float(a), Key::Float(b)) => a.total_cmp(b),
            (Key::Str(a), Key::Str(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_matches_python_f_string_shape() {
        let key = Key::Str("k1".to_string());
        assert_eq!(key.composite("t"), "t:k1");
    }

    #[test]
    fn int_keys_order_numerically() {
        assert!(Key::Int(1) < Key::Int(2));
    }

    #[test]
    fn float_keys_use_a_total_order() {
        let nan = Key::Float(f64::NAN);
        let one = Key::Float(1.0);
        // Must not panic and must produce a consistent (if arbitrary) order.
        let _ = nan.cmp(&one);
    }
}
