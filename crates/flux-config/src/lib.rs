pub mod global;
pub mod loader;
pub mod relay;

pub use global::{RelayConfig, SystemConfig};
pub use loader::ConfigLoader;
pub use relay::{EncoderOverrides, EngineSection, Preset, SinkSection};
