//! Person lifecycle across contexts.

use std::sync::Arc;

use faultline_context::{ContextError, EntityContext};
use faultline_core::{AttributeSpec, AttributeType, EntityKind};
use faultline_events::{ChangeBus, ChangeNotification, InMemoryChangeBus};
use faultline_person::{Person, person_kind};
use faultline_store::{InMemoryBackingStore, JsonFileStore};

fn context(store: Arc<InMemoryBackingStore>) -> EntityContext {
    faultline_observability::init();
    EntityContext::new(store, person_kind().unwrap())
}

#[test]
fn saved_person_is_read_back_with_one_fetch() {
    let store = InMemoryBackingStore::arc();

    let id = {
        let mut ctx = context(store.clone());
        let ada = Person::insert(&mut ctx, Some("Ada"), Some("Lovelace")).unwrap();
        ctx.save().unwrap();
        ada.id()
    };
    assert_eq!(store.stats().fetches, 0);

    let mut ctx = context(store.clone());
    let ada = Person::fetch(&mut ctx, id).unwrap();
    assert!(ada.entity().is_fault());

    assert_eq!(ada.first_name().unwrap().as_deref(), Some("Ada"));
    assert_eq!(ada.last_name().unwrap().as_deref(), Some("Lovelace"));
    assert_eq!(ada.full_name().unwrap(), "Ada Lovelace");
    assert_eq!(store.fetch_count(id.0), 1);
}

#[test]
fn unset_names_read_as_none() {
    let store = InMemoryBackingStore::arc();
    let mut ctx = context(store);

    let cher = Person::insert(&mut ctx, Some("Cher"), None).unwrap();

    assert_eq!(cher.last_name().unwrap(), None);
    assert_eq!(cher.full_name().unwrap(), "Cher");

    cher.set_first_name(None).unwrap();
    assert_eq!(cher.full_name().unwrap(), "");
}

#[test]
fn renames_are_saved_and_visible_after_invalidation() {
    let store = InMemoryBackingStore::arc();
    let bus: Arc<InMemoryChangeBus<ChangeNotification>> = Arc::new(InMemoryChangeBus::new());
    let mut writer = context(store.clone()).with_change_bus(bus.clone());
    let mut reader = context(store.clone());
    let subscription = bus.subscribe();

    let ada = Person::insert(&mut writer, Some("Ada"), Some("Byron")).unwrap();
    writer.save().unwrap();
    reader.drain_notifications(&subscription).unwrap();

    let theirs = Person::fetch(&mut reader, ada.id()).unwrap();
    assert_eq!(theirs.full_name().unwrap(), "Ada Byron");

    ada.set_last_name(Some("Lovelace")).unwrap();
    writer.save().unwrap();
    assert_eq!(theirs.full_name().unwrap(), "Ada Byron");

    reader.drain_notifications(&subscription).unwrap();
    assert_eq!(theirs.full_name().unwrap(), "Ada Lovelace");
}

#[test]
fn deleted_person_is_gone_for_good() {
    let store = InMemoryBackingStore::arc();
    let mut ctx = context(store.clone());
    let ada = Person::insert(&mut ctx, Some("Ada"), None).unwrap();
    ctx.save().unwrap();

    ada.entity().delete();
    assert_eq!(
        ada.set_first_name(Some("Grace")),
        Err(ContextError::EntityDeleted(ada.id().0))
    );
    ctx.save().unwrap();

    let mut other = context(store);
    let ghost = Person::fetch(&mut other, ada.id()).unwrap();
    assert_eq!(ghost.first_name(), Err(ContextError::StaleReference(ada.id().0)));
}

#[test]
fn other_kinds_are_not_people() {
    let note = Arc::new(
        EntityKind::new("Note", vec![AttributeSpec::optional("body", AttributeType::Text)])
            .unwrap(),
    );
    let mut ctx = EntityContext::new(InMemoryBackingStore::arc(), note);

    assert!(matches!(
        Person::insert(&mut ctx, Some("Ada"), None),
        Err(ContextError::Model(_))
    ));
    let entity = ctx.fetch(faultline_core::EntityId::new());
    assert!(matches!(Person::from_entity(entity), Err(ContextError::Model(_))));
}

#[test]
fn people_persist_in_a_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.json");

    let id = {
        let store = Arc::new(JsonFileStore::open(&path).unwrap());
        let mut ctx = EntityContext::new(store, person_kind().unwrap());
        let grace = Person::insert(&mut ctx, Some("Grace"), Some("Hopper")).unwrap();
        ctx.save().unwrap();
        grace.id()
    };

    let document = std::fs::read_to_string(&path).unwrap();
    assert!(document.contains("\"firstName\""));
    assert!(document.contains("Hopper"));

    let store = Arc::new(JsonFileStore::open(&path).unwrap());
    let mut ctx = EntityContext::new(store, person_kind().unwrap());
    let grace = Person::fetch(&mut ctx, id).unwrap();
    assert_eq!(grace.full_name().unwrap(), "Grace Hopper");
}
