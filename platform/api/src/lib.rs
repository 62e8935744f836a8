use async_graphql::{Error, ErrorExtensions};
use platform_authz::GradeError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("bad request: {0}")]
    InvalidInput(String),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "INVALID_INPUT",
        }
    }
}

impl From<GradeError> for ApiError {
    fn from(value: GradeError) -> Self {
        Self::InvalidInput(value.to_string())
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> Error {
        Error::new(self.to_string()).extend_with(|_err, e| {
            e.set("code", self.code());
            e.set("type", "BAD_REQUEST");
        })
    }
}
