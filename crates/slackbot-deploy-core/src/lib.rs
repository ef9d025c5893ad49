pub mod config;
pub mod digest;
pub mod env_file;
pub mod error;
pub mod ingress;
pub mod unit;

pub use error::AppError;
