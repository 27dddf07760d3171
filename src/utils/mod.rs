pub mod logging;
pub mod stats;

pub use logging::init_logging;
pub use stats::truncated_mean;
