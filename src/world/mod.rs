//! World Hosting
//!
//! World instances, connected players, the bootstrap collaborator that
//! builds instances, and the lifecycle manager that loads and unloads them.

pub mod bootstrap;
pub mod instance;
pub mod lifecycle;
pub mod players;

pub use bootstrap::{TemplateBootstrap, WorldBootstrap, WorldError, WorldTemplate};
pub use instance::{RegionState, WorldInstance, WorldKey, WORLD_NAMESPACE};
pub use lifecycle::{WorldLifecycleManager, WorldRegistration};
pub use players::{GameMode, PlayerDirectory, PlayerHandle, PlayerId};
