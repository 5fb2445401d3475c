#![deny(unused_variables)]

pub mod config;
pub mod error;
pub mod logging;
pub mod retry;
pub mod source;
pub mod traits;
pub mod types;

pub use error::{Error, ExpansionError, Result};
