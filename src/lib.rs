pub mod archive;
pub mod backup;
pub mod cli;
pub mod maria;
pub mod report;
pub mod utils;

pub use cli::{args, commands};
pub use report::{ReportRow, REPORT_QUERY};
pub use utils::{errors, paths};
