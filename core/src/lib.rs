pub mod config;
pub mod error;
pub mod github;
pub mod loc;
pub mod model;
pub mod period;
pub mod report;
pub mod stats;
