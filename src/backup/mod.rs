pub mod dump;

pub use dump::{extract_dump, DUMP_ENTRY_NAME};
