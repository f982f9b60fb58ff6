//! Composite keys
//!
//! A composite key is `\0{object_type}\0{attr1}\0{attr2}\0…`. Every key of a
//! table shares the `\0{object_type}\0` prefix, so a partial key followed by
//! U+10FFFF bounds a range scan over all keys extending it.

use quorate_common::{QuorateError, Result};

/// Separator between composite key parts
pub const MIN_UNICODE_RUNE: char = '\u{0}';

/// Upper bound for partial-key range scans
pub const MAX_UNICODE_RUNE: char = '\u{10FFFF}';

fn validate_part(part: &str) -> Result<()> {
    if part.contains(MIN_UNICODE_RUNE) || part.contains(MAX_UNICODE_RUNE) {
        return Err(QuorateError::invalid(format!(
            "key part {:?} contains a reserved character",
            part
        )));
    }
    Ok(())
}

pub fn create_composite_key(object_type: &str, attributes: &[&str]) -> Result<String> {
    if object_type.is_empty() {
        return Err(QuorateError::invalid("object type must not be empty"));
    }
    validate_part(object_type)?;

    let capacity = 2 + object_type.len() + attributes.iter().map(|a| a.len() + 1).sum::<usize>();
    let mut key = String::with_capacity(capacity);
    key.push(MIN_UNICODE_RUNE);
    key.push_str(object_type);
    key.push(MIN_UNICODE_RUNE);
    for attribute in attributes {
        validate_part(attribute)?;
        key.push_str(attribute);
        key.push(MIN_UNICODE_RUNE);
    }
    Ok(key)
}

/// Inverse of [`create_composite_key`]
pub fn split_composite_key(key: &str) -> Result<(String, Vec<String>)> {
    let body = key
        .strip_prefix(MIN_UNICODE_RUNE)
        .and_then(|rest| rest.strip_suffix(MIN_UNICODE_RUNE))
        .ok_or_else(|| QuorateError::invalid(format!("not a composite key: {:?}", key)))?;

    let mut parts = body.split(MIN_UNICODE_RUNE).map(str::to_string);
    let object_type = parts.next().unwrap_or_default();
    if object_type.is_empty() {
        return Err(QuorateError::invalid(format!("not a composite key: {:?}", key)));
    }
    Ok((object_type, parts.collect()))
}

/// `[start, end)` covering every key that extends the partial key
pub fn partial_key_range(object_type: &str, attributes: &[&str]) -> Result<(String, String)> {
    let start = create_composite_key(object_type, attributes)?;
    let mut end = start.clone();
    end.push(MAX_UNICODE_RUNE);
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let key = create_composite_key("Approval", &["p1", "sa1"]).unwrap();
        assert_eq!(key, "\u{0}Approval\u{0}p1\u{0}sa1\u{0}");
    }

    #[test]
    fn test_split_roundtrip() {
        let key = create_composite_key("Approval", &["p1", "sa1"]).unwrap();
        let (object_type, attrs) = split_composite_key(&key).unwrap();
        assert_eq!(object_type, "Approval");
        assert_eq!(attrs, vec!["p1".to_string(), "sa1".to_string()]);

        let (object_type, attrs) = split_composite_key("\u{0}Proposal\u{0}").unwrap();
        assert_eq!(object_type, "Proposal");
        assert!(attrs.is_empty());

        assert!(split_composite_key("plain-key").is_err());
    }

    #[test]
    fn test_reserved_characters_rejected() {
        assert!(create_composite_key("Approval", &["p\u{0}1"]).is_err());
        assert!(create_composite_key("Approval", &["p\u{10FFFF}"]).is_err());
        assert!(create_composite_key("", &["p1"]).is_err());
    }

    #[test]
    fn test_partial_range_bounds_children_only() {
        let (start, end) = partial_key_range("Approval", &["p1"]).unwrap();
        let child = create_composite_key("Approval", &["p1", "sa9"]).unwrap();
        let sibling = create_composite_key("Approval", &["p10", "sa1"]).unwrap();

        assert!(child.as_str() >= start.as_str() && child.as_str() < end.as_str());
        assert!(!(sibling.as_str() >= start.as_str() && sibling.as_str() < end.as_str()));
    }
}
