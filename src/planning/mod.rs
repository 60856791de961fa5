//! LLM test planning
//!
//! Plan data model, the planning workflow service, and the LLM boundary
//! trait it delegates to.

pub mod plan;
pub mod service;

pub use plan::{FunctionGroup, TestPlan, TestableFunction};
pub use service::{LoadOutcome, PlanningContext, TestPlanningService, TestStrategy};
