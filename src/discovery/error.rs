use crate::runtime;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("event stream failed: {0}")]
    EventStream(#[source] runtime::Error),
    #[error("event stream closed by the runtime")]
    EventStreamClosed,
    #[error("reconciler is no longer accepting batches")]
    ReconcilerGone,
    #[error("discovery task `{task}` did not complete: {source}")]
    Join {
        task: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
