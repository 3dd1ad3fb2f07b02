//! Shared utilities for the sepal scheduling core.
mod errors;
mod id;
mod math;
mod namegenerator;
mod out_file;

pub use errors::{Error, MultiError, SepalResult};
pub use id::{GSym, Id};
pub use math::bits_needed_for;
pub use namegenerator::NameGenerator;
pub use out_file::OutputFile;
