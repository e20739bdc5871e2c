//! Gating Tables
//!
//! Permission sets decide which items and blocks a player may use in the
//! current session; rulesets carry the world-rule overrides a variant applies
//! when it becomes active. Both are consulted by the host engine, never by the
//! tick state machines.

pub mod permissions;
pub mod ruleset;

pub use permissions::{PermissionMode, PermissionSet, ALLOW_ALL, DENY_ALL};
pub use ruleset::{BoolRule, IntRule, RuleSet, WorldRules};
