pub mod config;
pub mod error;

pub use config::{GraphSettings, ProbeSettings, RerankSettings, RerankerModel, Transport};
pub use error::{KgError, Result};
