//! CLI command implementations.
//!
//! | Module          | Commands handled        |
//! |-----------------|-------------------------|
//! | `run`           | `Run`                   |
//! | `addresses`     | `Addresses`             |
//! | `config`        | `Config`                |
//! | `history`       | `History`               |

pub mod addresses;
pub mod config;
pub mod history;
pub mod run;

pub use addresses::cmd_addresses;
pub use config::cmd_config;
pub use history::cmd_history;
pub use run::cmd_run;
