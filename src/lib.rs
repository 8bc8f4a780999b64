pub mod coherence;
pub mod common;
pub mod config;
pub mod context;
pub mod eval;
pub mod normal;
pub mod oracle;
pub mod quote;
pub mod syntax;
pub mod typecheck;
pub mod value;

pub use coherence::Coherence;
pub use config::{Config, ConfigError};
pub use context::Context;
pub use eval::Normalizer;
pub use oracle::{DerivativeOracle, OracleError, Symbolic};
pub use syntax::{Point, SmoothFn, Term, Type};
pub use typecheck::{CheckError, Checker, Endpoint};
pub use value::{Env, Value};
