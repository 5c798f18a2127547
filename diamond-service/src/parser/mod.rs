// Topology parser
// YAML topology files: schema, loading, validation and wiring into the local engine

pub mod error;
pub mod loader;
pub mod models;
pub mod validator;

pub use error::{ParseError, ParseErrorKind, ParseResult, Validation, ValidationError};
pub use loader::TopologyParser;
pub use models::*;
pub use validator::{TopologyValidator, ValidationReport};
