//! Property-path function stage: `name:arg1:arg2` segments applied
//! left-to-right after extraction (§4.K).

use crate::error::{ExprError, Result};
use crate::value::Value;
use chrono::{Datelike, NaiveDate};

#[derive(Debug, Clone)]
pub struct FuncCall {
    pub name: String,
    pub args: Vec<String>,
}

impl FuncCall {
    pub fn parse(segment: &str) -> Result<Self> {
        let mut parts = segment.split(':');
        let name = parts
            .next()
            .ok_or_else(|| ExprError::UnexpectedToken(segment.to_string()))?
            .to_string();
        if !KNOWN_FUNCS.contains(&name.as_str()) {
            return Err(ExprError::UnknownFunc(name));
        }
        Ok(FuncCall { name, args: parts.map(str::to_string).collect() })
    }

    #[must_use]
    pub fn apply(&self, v: Value) -> Value {
        apply_func(&self.name, &self.args, v)
    }
}

const KNOWN_FUNCS: &[&str] = &[
    "todate", "totime", "tostring", "toint", "tofloat", "tobool", "mid", "trim", "upper", "lower",
    "title", "pad", "split", "join", "camelsplit", "push", "pop", "shift", "peek", "foreach",
    "add", "date", "year", "month", "day",
];

fn parse_date(s: &str) -> Option<NaiveDate> {
    for fmt in ["%Y-%m-%d", "%Y:%m:%d", "%d/%m/%Y", "%Y%m%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    None
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut c = word.chars();
            match c.next() {
                Some(first) => first.to_uppercase().collect::<String>() + c.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn camel_split(s: &str) -> Vec<Value> {
    let mut words = Vec::new();
    let mut cur = String::new();
    for ch in s.chars() {
        if ch.is_uppercase() && !cur.is_empty() {
            words.push(Value::Str(std::mem::take(&mut cur)));
        }
        cur.push(ch);
    }
    if !cur.is_empty() {
        words.push(Value::Str(cur));
    }
    words
}

fn apply_func(name: &str, args: &[String], v: Value) -> Value {
    match name {
        "tostring" => Value::Str(v.as_str()),
        "toint" => v.as_f64().map(|f| Value::Int(f as i64)).unwrap_or(Value::Null),
        "tofloat" => v.as_f64().map(Value::Float).unwrap_or(Value::Null),
        "tobool" => Value::Bool(!v.is_empty() && v.as_str() != "0" && v.as_str() != "false"),
        "todate" | "date" => parse_date(&v.as_str()).map(Value::Date).unwrap_or(Value::Null),
        "totime" => Value::Str(v.as_str()),
        "trim" => Value::Str(v.as_str().trim().to_string()),
        "upper" => Value::Str(v.as_str().to_uppercase()),
        "lower" => Value::Str(v.as_str().to_lowercase()),
        "title" => Value::Str(title_case(&v.as_str())),
        "mid" => {
            let s = v.as_str();
            let start: usize = args.first().and_then(|a| a.parse().ok()).unwrap_or(0);
            let len: usize = args.get(1).and_then(|a| a.parse().ok()).unwrap_or(usize::MAX);
            let chars: Vec<char> = s.chars().collect();
            let end = start.saturating_add(len).min(chars.len());
            if start >= chars.len() {
                Value::Str(String::new())
            } else {
                Value::Str(chars[start..end].iter().collect())
            }
        }
        "pad" => {
            let s = v.as_str();
            let width: usize = args.first().and_then(|a| a.parse().ok()).unwrap_or(0);
            let fill = args.get(1).and_then(|a| a.chars().next()).unwrap_or('0');
            if s.len() >= width {
                Value::Str(s)
            } else {
                Value::Str(fill.to_string().repeat(width - s.len()) + &s)
            }
        }
        "split" => {
            let sep = args.first().map(String::as_str).unwrap_or(",");
            Value::List(v.as_str().split(sep).map(|s| Value::Str(s.to_string())).collect())
        }
        "join" => {
            let sep = args.first().map(String::as_str).unwrap_or(",");
            match v {
                Value::List(items) => {
                    Value::Str(items.iter().map(Value::as_str).collect::<Vec<_>>().join(sep))
                }
                other => other,
            }
        }
        "camelsplit" => Value::List(camel_split(&v.as_str())),
        "push" => match v {
            Value::List(mut items) => {
                items.push(Value::Str(args.first().cloned().unwrap_or_default()));
                Value::List(items)
            }
            other => Value::List(vec![other, Value::Str(args.first().cloned().unwrap_or_default())]),
        },
        "pop" => match v {
            Value::List(mut items) => {
                items.pop();
                Value::List(items)
            }
            other => other,
        },
        "shift" => match v {
            Value::List(mut items) => {
                if !items.is_empty() {
                    items.remove(0);
                }
                Value::List(items)
            }
            other => other,
        },
        "peek" => match v {
            Value::List(items) => items.last().cloned().unwrap_or(Value::Null),
            other => other,
        },
        "foreach" => match v {
            Value::List(items) => {
                let inner = args.first().cloned().unwrap_or_default();
                Value::List(items.into_iter().map(|item| apply_func(&inner, &[], item)).collect())
            }
            other => other,
        },
        "add" => {
            let delta: f64 = args.first().and_then(|a| a.parse().ok()).unwrap_or(0.0);
            match v.as_f64() {
                Some(n) => Value::Float(n + delta),
                None => v,
            }
        }
        "year" => match v {
            Value::Date(d) => Value::Int(i64::from(d.year())),
            other => parse_date(&other.as_str()).map(|d| Value::Int(i64::from(d.year()))).unwrap_or(Value::Null),
        },
        "month" => match v {
            Value::Date(d) => Value::Int(i64::from(d.month())),
            other => parse_date(&other.as_str()).map(|d| Value::Int(i64::from(d.month()))).unwrap_or(Value::Null),
        },
        "day" => match v {
            Value::Date(d) => Value::Int(i64::from(d.day())),
            other => parse_date(&other.as_str()).map(|d| Value::Int(i64::from(d.day()))).unwrap_or(Value::Null),
        },
        _ => v,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mid_extracts_substring() {
        let f = FuncCall::parse("mid:1:3").unwrap();
        assert_eq!(f.apply(Value::Str("hello".into())), Value::Str("ell".into()));
    }

    #[test]
    fn pad_left_pads() {
        let f = FuncCall::parse("pad:5:0").unwrap();
        assert_eq!(f.apply(Value::Str("42".into())), Value::Str("00042".into()));
    }

    #[test]
    fn split_then_join_roundtrips() {
        let split = FuncCall::parse("split:,").unwrap();
        let join = FuncCall::parse("join:-").unwrap();
        let v = split.apply(Value::Str("a,b,c".into()));
        assert_eq!(join.apply(v), Value::Str("a-b-c".into()));
    }

    #[test]
    fn camelsplit_breaks_on_uppercase() {
        let f = FuncCall::parse("camelsplit").unwrap();
        let Value::List(words) = f.apply(Value::Str("fooBarBaz".into())) else {
            panic!("expected list");
        };
        assert_eq!(words, vec![Value::Str("foo".into()), Value::Str("Bar".into()), Value::Str("Baz".into())]);
    }

    #[test]
    fn date_year_month_day() {
        let date = FuncCall::parse("date").unwrap();
        let year = FuncCall::parse("year").unwrap();
        let d = date.apply(Value::Str("2024-03-15".into()));
        assert_eq!(year.apply(d), Value::Int(2024));
    }

    #[test]
    fn unknown_func_rejected() {
        assert!(FuncCall::parse("bogus").is_err());
    }
}
