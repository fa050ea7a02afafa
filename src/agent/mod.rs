//! Disaster-response agents.
//!
//! Each kind is a declarative transition table on the generic engine in
//! [`crate::fsm`]. Rescue and medical agents react to derived events; field
//! agents are driven by ACL messages from a coordinator.

mod behaviors;
mod context;
pub mod field;
pub mod medical;
pub mod rescue;
mod types;

pub use behaviors::Behaviors;
pub use context::{AgentContext, Mission};
pub use field::FieldState;
pub use medical::MedicalState;
pub use rescue::RescueState;
pub use types::{Agent, AgentKind, AgentState, Effect, Goal, Trigger, TriggerPattern};
