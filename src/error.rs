use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::auth::AuthError;
use crate::files::FileServiceError;
use crate::repo::RepoError;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ApiErrorBody {
    pub err: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")] Unauthorized(String),
    #[error("{0}")] Validation(String),
    #[error("{0}")] BadRequest(String),
    #[error("{0}")] NotFound(String),
    #[error("{0}")] UnsupportedMediaType(String),
    #[error("{0}")] PayloadTooLarge(String),
    #[error("{0}")] Upload(String),
    #[error("{0}")] Read(String),
    #[error("internal error")] Internal,
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound("Not Found".into()),
            RepoError::Conflict | RepoError::Internal(_) => {
                log::error!("repository error: {e}");
                ApiError::Internal
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => ApiError::Unauthorized("Invalid username or password".into()),
            AuthError::InvalidToken | AuthError::UnknownUser => ApiError::Unauthorized("Validation Failed".into()),
            AuthError::MissingToken => ApiError::Unauthorized("Not Auth".into()),
            other => {
                log::error!("auth error: {other}");
                ApiError::Internal
            }
        }
    }
}

impl From<FileServiceError> for ApiError {
    fn from(e: FileServiceError) -> Self {
        match e {
            FileServiceError::Upload(inner) => {
                log::error!("upload failed: {inner}");
                ApiError::Upload("Error uploading file.".into())
            }
            FileServiceError::Repo(inner) => inner.into(),
            other => {
                log::error!("file read failed: {other}");
                ApiError::Read("Cannot read file".into())
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Upload(_) | ApiError::Read(_) | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // unrecognized failures get a bare status, everything else `{err}`
        if let ApiError::Internal = self {
            return HttpResponse::InternalServerError().finish();
        }
        HttpResponse::build(self.status_code()).json(ApiErrorBody { err: self.to_string() })
    }
}
