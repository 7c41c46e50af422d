//! `faultline-core`: model building blocks shared by every faultline crate.
//!
//! Identifiers, attribute values and entity kinds. No I/O lives here.

pub mod attribute;
pub mod error;
pub mod id;
pub mod kind;

pub use attribute::{AttributeMap, AttributeType, AttributeValue};
pub use error::{ModelError, ModelResult};
pub use id::{ContextId, EntityId};
pub use kind::{AttributeSpec, EntityKind};
