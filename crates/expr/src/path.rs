//! Property-path grammar: `name[#func]*`, where a leading `exif#`/`iptc#`/
//! `xmp#`/`ffmeta#` segment names an external metadata namespace instead of
//! a builtin property (§4.K).

use crate::error::{ExprError, Result};
use crate::func::FuncCall;
use media_dedup_common::Media;

const EXTERNAL_NAMESPACES: &[&str] = &["exif", "iptc", "xmp", "ffmeta"];

#[derive(Debug, Clone, PartialEq)]
pub enum PropertySource {
    Builtin(String),
    External { ns: String, key: String },
}

#[derive(Debug, Clone)]
pub struct PropertyPath {
    pub source: PropertySource,
    pub funcs: Vec<FuncCall>,
}

impl PropertyPath {
    pub fn parse(input: &str) -> Result<Self> {
        let mut segments = input.split('#');
        let first = segments.next().ok_or(ExprError::UnexpectedEnd)?;
        let (source, mut rest): (PropertySource, Vec<&str>) =
            if EXTERNAL_NAMESPACES.contains(&first) {
                let key = segments
                    .next()
                    .ok_or_else(|| ExprError::UnexpectedToken(input.to_string()))?;
                (
                    PropertySource::External { ns: first.to_string(), key: key.to_string() },
                    segments.collect(),
                )
            } else {
                (PropertySource::Builtin(first.to_string()), segments.collect())
            };
        rest.retain(|s| !s.is_empty());
        let funcs = rest
            .into_iter()
            .map(FuncCall::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(PropertyPath { source, funcs })
    }

    #[must_use]
    pub fn extract(&self, media: &Media) -> crate::value::Value {
        let mut v = match &self.source {
            PropertySource::Builtin(name) => builtin_value(media, name),
            PropertySource::External { ns, key } => {
                let attr_key = format!("{ns}#{key}");
                media
                    .attributes
                    .get(&attr_key)
                    .cloned()
                    .map(crate::value::Value::Str)
                    .unwrap_or(crate::value::Value::Null)
            }
        };
        for f in &self.funcs {
            v = f.apply(v);
        }
        v
    }
}

fn builtin_value(media: &Media, name: &str) -> crate::value::Value {
    use crate::value::Value;
    match name {
        "id" => Value::Int(i64::from(media.id)),
        "path" => Value::Str(media.path.to_string_lossy().into_owned()),
        "width" => Value::Int(i64::from(media.width)),
        "height" => Value::Int(i64::from(media.height)),
        "score" => Value::Int(i64::from(media.score)),
        "file_size" | "size" => Value::Int(media.file_size as i64),
        "is_weed" | "weed" => Value::Bool(media.is_weed),
        "digest" => media
            .digest
            .map(|d| Value::Str(hex::encode(d.0)))
            .unwrap_or(Value::Null),
        other => media
            .attributes
            .get(other)
            .cloned()
            .map(Value::Str)
            .unwrap_or(Value::Null),
    }
}

mod hex {
    pub fn encode(bytes: [u8; 16]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}
