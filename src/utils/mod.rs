pub mod crash;
pub mod errors;
pub mod output;
pub mod paths;
pub mod size;

pub use crash::*;
pub use errors::*;
pub use output::*;
pub use paths::*;
pub use size::*;
