pub mod error;
pub mod filename;
pub mod time;
pub mod types;
pub mod units;
