use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::TryInitError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to parse filter: {0}")]
    Parse(#[from] ParseError),
    #[error("failed to install subscriber: {0}")]
    Init(#[from] TryInitError),
}
