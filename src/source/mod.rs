//! Value sources: where field values come from.
//!
//! [`FuncSource`] and [`MapSource`] are the two general adapters. The
//! environment and TOML file sources build on them, and [`Loader`] stacks
//! several sources onto one record.

mod builder;
mod env;
mod error;
mod file;
mod func;
mod map;

pub use builder::Loader;
pub use env::EnvSource;
pub use error::{FieldError, LoadError};
pub use file::FileSource;
pub use func::FuncSource;
pub use map::MapSource;
