pub mod config;
pub mod docket;
pub mod error;
pub mod types;

pub use config::Config;
pub use docket::{docket_health, normalize_email, validate_docket_number, DocketHealth};
pub use error::DocketError;
pub use types::*;
