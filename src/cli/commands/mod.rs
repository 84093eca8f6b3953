//! CLI command implementations.

mod ask;
mod config;
mod doctor;
mod ingest;
mod list;
mod previews;
mod remove;
mod search;
mod serve;

pub use ask::run_ask;
pub use config::run_config;
pub use doctor::run_doctor;
pub use ingest::run_ingest;
pub use list::run_list;
pub use previews::run_previews;
pub use remove::run_remove;
pub use search::run_search;
pub use serve::run_serve;
