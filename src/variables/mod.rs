//! Variable resolution for collection requests.
//!
//! Covers `{{name}}` substitution, system variables, and capturing values
//! from responses for use by later requests.

pub mod capture;
pub mod request;
pub mod substitution;
pub mod system;

pub use capture::{parse_capture_directive, parse_capture_directives, CaptureDirective, PathType};
pub use request::extract_response_variable;
pub use substitution::{find_variable_references, substitute_variables, VariableContext};
pub use system::{clear_dotenv_cache, resolve_system_variable, VarError};
