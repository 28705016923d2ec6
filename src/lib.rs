pub mod error;
pub mod gmail_api;
pub mod service;
pub mod types;

pub use error::Error;
