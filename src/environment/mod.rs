//! Environment management.
//!
//! Loads named variable sets from environment files and selects the one a
//! run resolves `{{variables}}` against.

pub mod loader;
pub mod models;

pub use loader::{find_environment_file, load_environment_file, parse_environments, EnvError};
pub use models::{Environment, Environments};

/// Makes `name` the active environment.
///
/// # Errors
///
/// Returns [`EnvError::UnknownEnvironment`] listing the available names when
/// `name` is not defined.
pub fn select_environment(environments: &mut Environments, name: &str) -> Result<(), EnvError> {
    if environments.set_active(name) {
        Ok(())
    } else {
        Err(EnvError::UnknownEnvironment {
            name: name.to_string(),
            available: environments.list_environments().join(", "),
        })
    }
}
