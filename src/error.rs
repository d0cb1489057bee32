use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("invalid url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

impl FetchError {
    /// 429 and 5xx are worth another attempt; everything else is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => {
                *status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            FetchError::Http { source, .. } => source.is_timeout() || source.is_connect(),
            FetchError::InvalidUrl { .. } => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid CSS selector {selector:?}: {reason}")]
    Selector { selector: String, reason: String },
    #[error("unparseable price {raw:?}")]
    Price { raw: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open store at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("store read failed: {0}")]
    Read(#[source] rusqlite::Error),
    #[error("store write failed: {0}")]
    Write(#[source] rusqlite::Error),
    #[error("row {id} has a corrupt price {raw:?}")]
    Corrupt { id: i64, raw: String },
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("message transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("message rejected ({status}): {description}")]
    Rejected {
        status: reqwest::StatusCode,
        description: String,
    },
}
