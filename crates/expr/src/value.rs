//! Runtime value type the property-extractor/boolean interpreter operates
//! over (§4.K, §9 "parse once into a closure tree").

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDate),
    List(Vec<Value>),
}

impl Value {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Str(s) => s.is_empty(),
            Value::List(l) => l.is_empty(),
            _ => false,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::List(items) => items.iter().map(Value::as_str).collect::<Vec<_>>().join(","),
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Str(s) => s.parse().ok(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Ordering/equality comparisons fall back to string comparison when
    /// both sides aren't numeric, matching a loosely-typed property model.
    #[must_use]
    pub fn compare(&self, other: &Value) -> std::cmp::Ordering {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal),
            _ => self.as_str().cmp(&other.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_checks() {
        assert!(Value::Null.is_empty());
        assert!(Value::Str(String::new()).is_empty());
        assert!(!Value::Str("x".into()).is_empty());
    }

    #[test]
    fn numeric_compare_prefers_numbers_over_strings() {
        let a = Value::Str("10".into());
        let b = Value::Str("9".into());
        assert_eq!(a.compare(&b), std::cmp::Ordering::Greater);
    }
}
