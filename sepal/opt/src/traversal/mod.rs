//! Shared machinery for passes: option parsing, construction, diagnostics.
mod construct;
mod diagnostics;
mod pass;

pub use construct::{ConstructPass, Named, ParseVal, PassOpt};
pub use diagnostics::{DiagnosticContext, DiagnosticPass, DiagnosticResult};
pub use pass::Pass;
