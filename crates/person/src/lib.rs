//! Person domain module.
//!
//! Declares the `Person` entity kind (`firstName`, `lastName`) and a typed
//! view over the generic entities a context hands out. Storage, faulting and
//! identity are entirely the context's business.

pub mod person;

pub use person::{
    FIRST_NAME, KIND_NAME, LAST_NAME, Person, PersonId, person_attributes, person_kind,
};
