pub mod acl;
pub mod agent;
pub mod config;
pub mod conversation;
pub mod error;
pub mod event;
pub mod fsm;
pub mod journal;
pub mod simulation;

pub use error::{Error, Result};
