pub mod catalog;
pub mod command;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod output;
pub mod queue;
pub mod retry;
pub mod sink;
pub mod source;
pub mod status;
pub mod supervisor;

pub use catalog::{CatalogEntry, SourceCatalog, StaticCatalog};
pub use command::{build_arguments, tee_output};
pub use encoder::EncoderConfig;
pub use engine::{EngineSettings, RelayEngine, RelayEngineBuilder};
pub use error::{RelayError, Result};
pub use output::{classify_line, OutputChannel, OutputLogger};
pub use queue::{AddSummary, SourceQueue};
pub use retry::{Health, RetryDecision, RetryPolicy, RetryTracker};
pub use sink::{RtmpSink, SinkAdapter, SinkContext};
pub use source::{Source, SourceKind};
pub use status::EngineStatus;
pub use supervisor::{FfmpegSupervisor, ProcessOutcome, ProcessRunner};
