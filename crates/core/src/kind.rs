//! Entity kinds: the fixed attribute shape shared by every entity of one type.

use std::collections::BTreeSet;

use crate::attribute::{AttributeMap, AttributeType, AttributeValue};
use crate::error::{ModelError, ModelResult};

/// One declared attribute of an entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: String,
    pub attribute_type: AttributeType,
    /// Optional attributes may hold `Null`.
    pub optional: bool,
}

impl AttributeSpec {
    pub fn optional(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            optional: true,
        }
    }

    pub fn required(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            optional: false,
        }
    }

    fn check(&self, value: &AttributeValue) -> ModelResult<()> {
        if value.is_null() {
            return if self.optional {
                Ok(())
            } else {
                Err(ModelError::missing(&self.name))
            };
        }
        if !self.attribute_type.accepts(value) {
            return Err(ModelError::TypeMismatch {
                attribute: self.name.clone(),
                expected: self.attribute_type.name(),
                actual: value.type_name(),
            });
        }
        Ok(())
    }
}

/// A named, closed set of attributes.
///
/// Every entity in a context belongs to exactly one kind; attribute names
/// outside the kind are rejected on read, write, insert and materialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityKind {
    name: String,
    attributes: Vec<AttributeSpec>,
}

impl EntityKind {
    /// Declare a kind. Fails on an empty kind name, an empty attribute name,
    /// or a duplicated attribute name.
    pub fn new(name: impl Into<String>, attributes: Vec<AttributeSpec>) -> ModelResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ModelError::invalid_kind("kind name cannot be empty"));
        }

        let mut seen = BTreeSet::new();
        for spec in &attributes {
            if spec.name.trim().is_empty() {
                return Err(ModelError::invalid_kind(format!(
                    "kind '{name}' declares an attribute with an empty name"
                )));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(ModelError::invalid_kind(format!(
                    "kind '{name}' declares attribute '{}' twice",
                    spec.name
                )));
            }
        }

        Ok(Self { name, attributes })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attributes
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name.as_str())
    }

    /// Look up the declaration for `attribute`.
    pub fn spec(&self, attribute: &str) -> ModelResult<&AttributeSpec> {
        self.attributes
            .iter()
            .find(|a| a.name == attribute)
            .ok_or_else(|| ModelError::unknown_attribute(&self.name, attribute))
    }

    /// Validate a single attribute write.
    pub fn check(&self, attribute: &str, value: &AttributeValue) -> ModelResult<()> {
        self.spec(attribute)?.check(value)
    }

    /// Turn a stored row into the full attribute set.
    ///
    /// Absent optional attributes become `Null`. Any unknown name, type
    /// mismatch or missing required value rejects the whole row.
    pub fn materialize(&self, row: AttributeMap) -> ModelResult<AttributeMap> {
        self.complete(row)
    }

    /// Validate the attributes supplied for a fresh insert and complete them
    /// the same way a stored row is completed.
    pub fn prepare_insert(&self, initial: AttributeMap) -> ModelResult<AttributeMap> {
        self.complete(initial)
    }

    fn complete(&self, mut row: AttributeMap) -> ModelResult<AttributeMap> {
        for (name, value) in &row {
            self.check(name, value)?;
        }
        for spec in &self.attributes {
            if !row.contains_key(&spec.name) {
                if !spec.optional {
                    return Err(ModelError::missing(&spec.name));
                }
                row.insert(spec.name.clone(), AttributeValue::Null);
            }
        }
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes;

    fn contact_kind() -> EntityKind {
        EntityKind::new(
            "Contact",
            vec![
                AttributeSpec::required("email", AttributeType::Text),
                AttributeSpec::optional("nickname", AttributeType::Text),
                AttributeSpec::optional("score", AttributeType::Float),
            ],
        )
        .unwrap()
    }

    #[test]
    fn duplicate_attribute_names_are_rejected() {
        let err = EntityKind::new(
            "Contact",
            vec![
                AttributeSpec::optional("email", AttributeType::Text),
                AttributeSpec::optional("email", AttributeType::Text),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::InvalidKind(msg) if msg.contains("twice")));
    }

    #[test]
    fn empty_kind_name_is_rejected() {
        assert!(matches!(
            EntityKind::new("  ", vec![]),
            Err(ModelError::InvalidKind(_))
        ));
    }

    #[test]
    fn materialize_fills_absent_optionals_with_null() {
        let kind = contact_kind();
        let full = kind
            .materialize(attributes! { "email" => "ada@example.com" })
            .unwrap();

        assert_eq!(full.len(), 3);
        assert_eq!(full["nickname"], AttributeValue::Null);
        assert_eq!(full["score"], AttributeValue::Null);
    }

    #[test]
    fn materialize_rejects_the_whole_row_on_one_bad_value() {
        let kind = contact_kind();
        let err = kind
            .materialize(attributes! { "email" => "ada@example.com", "score" => "high" })
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::TypeMismatch {
                attribute: "score".to_string(),
                expected: "float",
                actual: "text",
            }
        );
    }

    #[test]
    fn unknown_and_missing_attributes_are_reported() {
        let kind = contact_kind();
        assert_eq!(
            kind.check("phone", &AttributeValue::from("555")),
            Err(ModelError::unknown_attribute("Contact", "phone"))
        );
        assert_eq!(
            kind.prepare_insert(attributes! { "nickname" => "ada" }),
            Err(ModelError::missing("email"))
        );
        assert_eq!(
            kind.check("email", &AttributeValue::Null),
            Err(ModelError::missing("email"))
        );
    }
}
