//! Build executor and packager.

pub mod error;
pub mod exec;
pub mod package;

pub use error::{Error, Result};
pub use exec::run;
pub use package::package;
