//! Session Orchestration
//!
//! Bindings and their durable store, the registry that owns every piece of
//! mutable session state, the tick driver, and the admin command surface.

pub mod binding;
pub mod commands;
pub mod driver;
pub mod registry;
pub mod store;

pub use binding::{Binding, BindingSnapshot, BindingTable};
pub use commands::{AdminCommand, CommandError};
pub use driver::TickDriver;
pub use registry::{PlayerAction, RegistryError, RegistryStatus, SessionRegistry, LOBBY_WORLD};
pub use store::{BindingStore, JsonFileStore, MemoryStore, StoreError};
