//! Attribute list formatting for select lists, group aggregates and
//! JSON object literals.
//!
//! Attribute names are spliced into the statement as written. They come
//! from server configuration, not from request input, and are not escaped.

use crate::query::CompileError;

/// Columns the compiled plan uses internally. An attribute with one of
/// these names would shadow a plan column.
pub const RESERVED_COLUMNS: &[&str] = &[
    "center",
    "size",
    "clusterno",
    "previousclusterno",
    "clusters",
    "expansionzoom",
    "geom",
    "attributes",
];

/// Member ordering used when folding attributes of merged cluster members.
///
/// The largest member wins; equal sizes fall back to the westernmost, then
/// southernmost point, so the picked value does not depend on row order.
pub const MEMBER_ORDER: &str = "size DESC, ST_X(center), ST_Y(center)";

/// Ordered list of attribute columns carried through every stage.
///
/// Insertion order is preserved and determines the key order of the
/// per-feature JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeList {
    names: Vec<String>,
}

impl AttributeList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Select-list fragment: `, a, b`.
    pub fn to_select(&self) -> String {
        self.names.iter().map(|name| format!(", {}", name)).collect()
    }

    /// First-value aggregate fragment: `, FIRST(a ORDER BY ...) AS a, ...`.
    pub fn to_first_values(&self) -> String {
        self.names
            .iter()
            .map(|name| format!(", FIRST({name} ORDER BY {MEMBER_ORDER}) AS {name}"))
            .collect()
    }

    /// JSON key/value fragment: `, 'a', a, 'b', b`.
    pub fn to_json_pairs(&self) -> String {
        self.names
            .iter()
            .map(|name| format!(", '{name}', {name}"))
            .collect()
    }

    /// Reject attribute sets the plan cannot carry: empty names, duplicates
    /// and names colliding with internal plan columns.
    pub fn validate(&self) -> Result<(), CompileError> {
        let mut seen: Vec<String> = Vec::with_capacity(self.names.len());

        for name in &self.names {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                return Err(CompileError::UnsupportedAttribute {
                    name: name.clone(),
                    reason: "attribute name is empty",
                });
            }

            // unquoted identifiers fold to lower case in PostgreSQL
            let folded = trimmed.to_ascii_lowercase();
            if RESERVED_COLUMNS.contains(&folded.as_str()) {
                return Err(CompileError::UnsupportedAttribute {
                    name: name.clone(),
                    reason: "attribute name collides with a plan column",
                });
            }
            if seen.contains(&folded) {
                return Err(CompileError::UnsupportedAttribute {
                    name: name.clone(),
                    reason: "attribute listed more than once",
                });
            }
            seen.push(folded);
        }

        Ok(())
    }
}

impl<S: Into<String>> FromIterator<S> for AttributeList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AttributeList {
        AttributeList::new(["id", "name", "field"])
    }

    #[test]
    fn test_to_select() {
        assert_eq!(sample().to_select(), ", id, name, field");
        assert_eq!(AttributeList::default().to_select(), "");
    }

    #[test]
    fn test_to_first_values() {
        let fragment = AttributeList::new(["id", "name"]).to_first_values();
        assert_eq!(
            fragment,
            ", FIRST(id ORDER BY size DESC, ST_X(center), ST_Y(center)) AS id\
             , FIRST(name ORDER BY size DESC, ST_X(center), ST_Y(center)) AS name"
        );
        assert_eq!(AttributeList::default().to_first_values(), "");
    }

    #[test]
    fn test_to_json_pairs() {
        assert_eq!(sample().to_json_pairs(), ", 'id', id, 'name', name, 'field', field");
        assert_eq!(AttributeList::default().to_json_pairs(), "");
    }

    #[test]
    fn test_order_is_preserved() {
        let list: AttributeList = ["z", "a", "m"].into_iter().collect();
        assert_eq!(list.to_select(), ", z, a, m");
    }

    #[test]
    fn test_validate_accepts_plain_names() {
        assert!(sample().validate().is_ok());
        assert!(AttributeList::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_reserved_names() {
        let err = AttributeList::new(["status", "expansionZoom"])
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::UnsupportedAttribute { ref name, .. } if name == "expansionZoom"
        ));
    }

    #[test]
    fn test_validate_rejects_duplicates_and_empty() {
        assert!(AttributeList::new(["a", "A"]).validate().is_err());
        assert!(AttributeList::new(["a", " "]).validate().is_err());
    }
}
