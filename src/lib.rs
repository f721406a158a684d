pub mod adapters;
pub mod config;
pub mod errors;
pub mod history;
pub mod logging;
pub mod pipeline;
pub mod ui;
