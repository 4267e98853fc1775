use crate::{config, discovery, persistence, runtime};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] config::Error),
    #[error("failed to initialise the prometheus file handler: {0}")]
    Persistence(#[from] persistence::Error),
    #[error("failed to initialise the docker handler: {0}")]
    Runtime(#[from] runtime::Error),
    #[error(transparent)]
    Discovery(#[from] discovery::Error),
    #[error("failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),
    #[error("failed to bind API server to port {port}: {source}")]
    ApiBind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("API server failed: {0}")]
    ApiServe(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

pub trait ResultOkLogExt<T, E> {
    fn ok_log(self) -> Option<T>;
}

impl<T, E> ResultOkLogExt<T, E> for std::result::Result<T, E>
where
    E: std::error::Error,
{
    fn ok_log(self) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::error!("{err}");
                None
            }
        }
    }
}
