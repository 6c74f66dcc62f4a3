//! Azure CLI plumbing: locating `az` and running it.

pub mod executor;
pub mod locator;

pub use executor::{AzureCli, DEFAULT_MAX_OUTPUT, Invocation, run_program};
pub use locator::Locator;
