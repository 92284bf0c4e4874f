pub mod composer;

pub use composer::{compose_overview, compose_single};
