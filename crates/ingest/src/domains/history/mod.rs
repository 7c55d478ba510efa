mod convert_history;
mod history_service;
mod history_window;

pub use convert_history::*;
pub use history_service::*;
pub use history_window::*;
