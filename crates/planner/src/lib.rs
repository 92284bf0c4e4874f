pub mod parameter_validator;
pub mod plan_validator;
pub mod planner;

pub use planner::{plan, AvailableTool, PlanRequest};
pub use plan_validator::{validate_plan, PlanValidation, PlanValidationError, PlanValidationWarning, ValidationErrorKind};
