pub mod assemble;
pub mod config;
pub mod error;
pub mod fetch;
pub mod flatten;
pub mod io;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod secrets;
pub mod summary;
pub mod sync;
pub mod unify;

pub use error::{Result, ToolError};
