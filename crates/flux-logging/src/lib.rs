pub mod init;
pub mod level;
pub mod sampler;

pub use init::{init_logging, LogFormat, LoggingConfig, LoggingError};
pub use level::LogLevel;
pub use sampler::LogSampler;
