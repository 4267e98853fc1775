#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "metrics path `{path}` must start with `/`, must not contain `{{` or `}}` \
         and must not be `/health` or `/targets`"
    )]
    InvalidMetricsPath { path: String },
}

pub type Result<T> = std::result::Result<T, Error>;
