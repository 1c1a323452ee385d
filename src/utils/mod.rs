// Shared helpers used across the extraction pipeline
pub mod constants;
pub mod errors;
pub mod timeout;
pub mod wait_for_element;

pub use timeout::{validate_navigation_timeout, validate_readiness_timeout};
pub use wait_for_element::wait_for_condition;
