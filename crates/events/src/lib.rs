//! Change notifications and the bus that carries them between contexts.
//!
//! A context that commits a row change publishes a [`ChangeNotification`];
//! every other context over the same backing store subscribes and turns the
//! notification into an invalidation of its own copy.

pub mod bus;
pub mod in_memory_bus;
pub mod notification;

pub use bus::{BusError, ChangeBus, Subscription};
pub use in_memory_bus::InMemoryChangeBus;
pub use notification::{ChangeKind, ChangeNotification};
