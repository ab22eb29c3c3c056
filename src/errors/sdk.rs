use thiserror::Error;

/// Well-known failures reported by the Atlas API client.
///
/// Classification and formatting recognise these anywhere in an error chain.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiError {
    #[error("resource not found")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("resource conflict")]
    Conflict,

    #[error("transient API failure")]
    Transient,
}

impl ApiError {
    /// 403 has no sentinel: a missing role is an authorization problem,
    /// not bad credentials.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            401 => Some(ApiError::Unauthorized),
            404 => Some(ApiError::NotFound),
            409 => Some(ApiError::Conflict),
            429 | 500..=599 => Some(ApiError::Transient),
            _ => None,
        }
    }
}

/// An HTTP failure returned by the API, optionally carrying the matching sentinel.
#[derive(Error, Debug)]
#[error("HTTP {status}: {message}")]
pub struct HttpError {
    pub status: u16,
    pub message: String,
    #[source]
    pub sentinel: Option<ApiError>,
}

impl HttpError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            sentinel: ApiError::from_status(status),
        }
    }
}
