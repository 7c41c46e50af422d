use std::sync::Arc;

use faultline_context::{ContextError, ContextResult, Entity, EntityContext};
use faultline_core::{
    AttributeMap, AttributeSpec, AttributeType, AttributeValue, EntityId, EntityKind, ModelError,
    ModelResult,
};

pub const KIND_NAME: &str = "Person";
pub const FIRST_NAME: &str = "firstName";
pub const LAST_NAME: &str = "lastName";

/// Person identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PersonId(pub EntityId);

impl PersonId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PersonId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// The `Person` kind: `firstName` and `lastName`, both optional text.
pub fn person_kind() -> ModelResult<Arc<EntityKind>> {
    let kind = EntityKind::new(
        KIND_NAME,
        vec![
            AttributeSpec::optional(FIRST_NAME, AttributeType::Text),
            AttributeSpec::optional(LAST_NAME, AttributeType::Text),
        ],
    )?;
    Ok(Arc::new(kind))
}

/// Initial attributes for a new person. `None` leaves the name unset.
pub fn person_attributes(first_name: Option<&str>, last_name: Option<&str>) -> AttributeMap {
    let mut attributes = AttributeMap::new();
    if let Some(first) = first_name {
        attributes.insert(FIRST_NAME.to_string(), AttributeValue::from(first));
    }
    if let Some(last) = last_name {
        attributes.insert(LAST_NAME.to_string(), AttributeValue::from(last));
    }
    attributes
}

/// Typed view over a `Person` entity.
///
/// Holds the shared entity handle, so reads fault the person in exactly like
/// generic attribute access does.
#[derive(Debug, Clone)]
pub struct Person {
    entity: Entity,
}

impl Person {
    /// Wrap `entity`, checking that it is a person.
    pub fn from_entity(entity: Entity) -> ContextResult<Self> {
        let kind = entity.kind().name();
        if kind != KIND_NAME {
            return Err(
                ModelError::invalid_kind(format!("expected a {KIND_NAME}, got a {kind}")).into(),
            );
        }
        Ok(Self { entity })
    }

    /// The person for `id` in `ctx`, as a fault until first read.
    pub fn fetch(ctx: &mut EntityContext, id: PersonId) -> ContextResult<Self> {
        Self::from_entity(ctx.fetch(id.0))
    }

    /// Insert a new person; written on the next save.
    pub fn insert(
        ctx: &mut EntityContext,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> ContextResult<Self> {
        if ctx.kind().name() != KIND_NAME {
            return Err(ModelError::invalid_kind(format!(
                "context manages {}, not {KIND_NAME}",
                ctx.kind().name()
            ))
            .into());
        }
        let entity = ctx.insert(person_attributes(first_name, last_name))?;
        Ok(Self { entity })
    }

    pub fn id(&self) -> PersonId {
        PersonId(self.entity.id())
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn first_name(&self) -> ContextResult<Option<String>> {
        self.text(FIRST_NAME)
    }

    pub fn set_first_name(&self, first_name: Option<&str>) -> ContextResult<()> {
        self.entity.set(FIRST_NAME, first_name)
    }

    pub fn last_name(&self) -> ContextResult<Option<String>> {
        self.text(LAST_NAME)
    }

    pub fn set_last_name(&self, last_name: Option<&str>) -> ContextResult<()> {
        self.entity.set(LAST_NAME, last_name)
    }

    /// First and last name joined by a space, skipping unset parts.
    ///
    /// Both names come from one materialization.
    pub fn full_name(&self) -> ContextResult<String> {
        let attributes = self.entity.attributes()?;
        let parts: Vec<&str> = [FIRST_NAME, LAST_NAME]
            .iter()
            .filter_map(|name| attributes.get(*name).and_then(AttributeValue::as_str))
            .filter(|part| !part.is_empty())
            .collect();
        Ok(parts.join(" "))
    }

    fn text(&self, name: &str) -> ContextResult<Option<String>> {
        match self.entity.get(name)? {
            AttributeValue::Null => Ok(None),
            AttributeValue::Text(text) => Ok(Some(text)),
            other => Err(ContextError::invariant(format!(
                "{KIND_NAME}.{name} holds a {} value",
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn person_kind_declares_both_names_as_optional_text() {
        let kind = person_kind().unwrap();
        assert_eq!(kind.name(), "Person");
        assert_eq!(kind.attribute_names().collect::<Vec<_>>(), vec!["firstName", "lastName"]);
        assert!(kind.attributes().iter().all(|a| a.optional));
        assert!(kind.check(FIRST_NAME, &AttributeValue::Integer(1)).is_err());
    }

    #[test]
    fn person_attributes_skips_unset_names() {
        let attributes = person_attributes(Some("Ada"), None);
        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes[FIRST_NAME], AttributeValue::from("Ada"));
    }

    #[test]
    fn person_id_displays_as_the_entity_id() {
        let id = EntityId::new();
        assert_eq!(PersonId::new(id).to_string(), id.to_string());
    }
}
