//! Categorizer, Planner, Coordinator, Generator, and Validator for the OQ
//! test-suite generation orchestration engine, wired into a single
//! workflow driver (spec §2 System Overview, §5 Concurrency & Resource
//! Model).

pub mod categorizer;
pub mod coordinator;
pub mod events;
pub mod generator;
pub mod planner;
pub mod validator;
pub mod workflow;

pub use workflow::{run_workflow, WorkflowOutcome};
