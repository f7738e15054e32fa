// Load modules
mod iteration_controller;
mod run_context;

// Expose
pub use iteration_controller::{ControllerState, IterationController, IterationOutcome, IterationStep, next_step};
pub use run_context::RunContext;
