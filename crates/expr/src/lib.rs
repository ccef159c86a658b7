//! CLI property-extractor / boolean-expression sublanguage (§4.K) used by
//! `-with`/`-without`/`-group-by` query flags.

mod error;
mod expr;
mod func;
mod lexer;
mod path;
mod value;

pub use error::{ExprError, Result};
pub use expr::Expression;
pub use func::FuncCall;
pub use path::{PropertyPath, PropertySource};
pub use value::Value;

use media_dedup_common::Media;
use std::collections::HashMap;

/// `-group-by <path>`: bucket media by the string form of an extracted
/// property, preserving first-seen bucket order.
#[must_use]
pub fn group_by(path: &PropertyPath, items: Vec<Media>) -> Vec<(String, Vec<Media>)> {
    let mut order = Vec::new();
    let mut groups: HashMap<String, Vec<Media>> = HashMap::new();
    for item in items {
        let key = path.extract(&item).as_str();
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(item);
    }
    order.into_iter().map(|key| { let v = groups.remove(&key).unwrap_or_default(); (key, v) }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_dedup_common::MediaType;
    use std::path::PathBuf;

    #[test]
    fn group_by_preserves_first_seen_order() {
        let path = PropertyPath::parse("width").unwrap();
        let mut a = Media::new(PathBuf::from("/a"), MediaType::Image);
        a.width = 10;
        let mut b = Media::new(PathBuf::from("/b"), MediaType::Image);
        b.width = 20;
        let mut c = Media::new(PathBuf::from("/c"), MediaType::Image);
        c.width = 10;
        let grouped = group_by(&path, vec![a, b, c]);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].0, "10");
        assert_eq!(grouped[0].1.len(), 2);
        assert_eq!(grouped[1].0, "20");
    }
}
