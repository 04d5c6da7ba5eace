pub mod clean;
mod error;

pub use error::Error;
