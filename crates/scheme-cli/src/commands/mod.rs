//! Command implementations.

pub mod extract;
pub mod rules;
pub mod show_config;

pub use self::extract::execute_extract;
pub use self::rules::execute_rules;
pub use self::show_config::execute_show_config;
