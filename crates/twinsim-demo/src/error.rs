use std::path::PathBuf;

/// Errors that can occur in the headless runner.
#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    /// Failed to load the scenario directory.
    #[error("data load error in {dir}: {source}")]
    DataLoad {
        dir: PathBuf,
        source: twinsim_data::DataLoadError,
    },

    /// A script names a node the engine does not know.
    #[error("script node '{key}' not found in the network")]
    NodeNotFound { key: String },

    /// A random spike block with an invalid cadence or intensity range.
    #[error("invalid random spikes: {detail}")]
    InvalidRandomSpikes { detail: String },

    /// Frames must advance the clock.
    #[error("frame length must be positive")]
    ZeroFrame,

    /// Checkpoint save or restore failed.
    #[error("checkpoint error: {detail}")]
    Checkpoint { detail: String },
}

impl From<twinsim_core::serialize::SerializeError> for DemoError {
    fn from(e: twinsim_core::serialize::SerializeError) -> Self {
        DemoError::Checkpoint {
            detail: e.to_string(),
        }
    }
}

impl From<twinsim_core::serialize::DeserializeError> for DemoError {
    fn from(e: twinsim_core::serialize::DeserializeError) -> Self {
        DemoError::Checkpoint {
            detail: e.to_string(),
        }
    }
}
