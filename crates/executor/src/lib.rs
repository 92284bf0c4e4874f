pub mod executor;
pub mod param_resolution;

pub use executor::{execute_plan, plan_succeeded, ExecutorConfig};
pub use param_resolution::resolve_params;
