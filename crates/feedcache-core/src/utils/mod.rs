pub mod format;

pub use format::{action_label, format_date, truncate_string};
