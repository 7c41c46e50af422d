//! `faultline-context`: identity-mapped, lazily materialized entities.
//!
//! An [`EntityContext`] hands out [`Entity`] handles for stored records.
//! A freshly fetched entity is a *fault*: it knows its id and nothing else.
//! The first attribute access loads the whole row from the
//! [`BackingStore`](faultline_store::BackingStore) in one request. Within
//! one context, every request for the same id yields the same instance.
//!
//! ```text
//! fetch(id) ──▶ Fault ──first read──▶ Resident ──save──▶ store
//!                 ▲                       │
//!                 └────── invalidate ─────┘
//! ```
//!
//! Contexts that share a store learn about each other's commits through a
//! [`ChangeBus`](faultline_events::ChangeBus); see
//! [`EntityContext::apply_notification`].

pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod identity_map;

pub use config::{ContextConfig, RemoteChangePolicy, UnknownPolicy};
pub use context::{EntityContext, PendingChanges};
pub use entity::{DeletionCause, Entity, EntityState};
pub use error::{ContextError, ContextResult, SaveError, SaveFailure, SaveOperation};
pub use identity_map::IdentityMap;
