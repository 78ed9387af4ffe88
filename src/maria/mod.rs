pub mod database;
pub mod distribution;
pub mod server;

pub use database::{ping, recreate_database, DATABASE_NAME};
pub use distribution::{BinaryNames, Distribution, DistributionPaths, DEFAULT_DISTRIBUTION_ZIP};
pub use server::{LifecycleState, MariaDb, DEFAULT_PORT};
