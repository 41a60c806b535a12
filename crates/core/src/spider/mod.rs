//! The bounded-concurrency catalog sweep: id source, configuration and
//! the fetch/validate/persist driver.

mod config;
mod ids;
mod runner;

pub use config::SpiderConfig;
pub use ids::IdRange;
pub use runner::{Spider, SpiderProgress};
