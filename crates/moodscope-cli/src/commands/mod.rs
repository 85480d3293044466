pub mod analyze;
pub mod config;
pub mod history;
pub mod rules;

pub use analyze::run_analyze;
pub use history::show_history;
