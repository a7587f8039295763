use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, KeywaveError>;

/// Everything that can go wrong before or around an animation run.
///
/// Frame transmission failures never surface here; the sink logs them and
/// the animation keeps going.
#[derive(Debug, Error)]
pub enum KeywaveError {
    #[error("SteelSeries Engine config not found at {0}")]
    CorePropsMissing(PathBuf),

    #[error("could not read {path}: {source}")]
    CorePropsRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed {path}: {source}")]
    CorePropsParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no coreProps.json location is known for this platform; set daemon.address or --core-props")]
    NoCorePropsLocation,

    #[error("invalid settings file {path}: {source}")]
    Settings {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid animation config: {0}")]
    InvalidConfig(String),

    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl KeywaveError {
    pub fn http(endpoint: &str, source: ureq::Error) -> Self {
        KeywaveError::Http {
            endpoint: endpoint.to_string(),
            source: Box::new(source),
        }
    }
}
