// Workflow definition and the atomic transition executor

pub mod definition;
pub mod state_machine;

pub use definition::{Action, Transition};
pub use state_machine::{TransitionExecutor, TransitionOutcome, TransitionPlan};
