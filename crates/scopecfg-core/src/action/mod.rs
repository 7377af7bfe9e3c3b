//! Named actions: registration and execution with recorded outcomes

pub mod executor;
pub mod types;

pub use executor::ActionExecutor;
pub use types::{
	ActionContext, ActionDefinition, ActionHandler, ActionRegistry, ActionResult,
	FrozenActionRegistry,
};

// vim: ts=4
