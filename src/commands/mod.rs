//! CLI command implementations

mod dump;
mod list;

pub use dump::run_dump;
pub use list::list_programmers;
