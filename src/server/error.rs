use super::context::SessionUnavailable;
use crate::geocode;
use crate::store::StoreError;
use crate::templates::{self, RenderError, RenderRucte};
use crate::uploads;
use tracing::{error, warn};
use warp::filters::body::BodyDeserializeError;
use warp::http::response::Builder;
use warp::http::status::StatusCode;
use warp::reject::{MethodNotAllowed, PayloadTooLarge, UnsupportedMediaType};
use warp::reply::Response;
use warp::{self, Rejection, Reply};

pub enum ViewError {
    /// 404
    NotFound,
    /// 400
    BadRequest(String),
    /// A redirect, usually with a flash message already stored.
    Redirect(Response),
    /// 503
    ServiceUnavailable,
    /// 500
    Err(&'static str),
}

pub trait ViewResult<T> {
    fn ise(self) -> Result<T, ViewError>;
    fn req(self, msg: &str) -> Result<T, ViewError>;
}

impl<T, E> ViewResult<T> for Result<T, E>
where
    E: std::fmt::Debug,
{
    fn ise(self) -> Result<T, ViewError> {
        self.map_err(|e| {
            error!("Internal server error: {:?}", e);
            ViewError::Err(GENERIC_ERROR)
        })
    }
    fn req(self, msg: &str) -> Result<T, ViewError> {
        self.map_err(|e| {
            warn!("Bad request, {}: {:?}", msg, e);
            ViewError::BadRequest(msg.into())
        })
    }
}

const GENERIC_ERROR: &str = "Oh No, Something Went Wrong!";

impl Reply for ViewError {
    fn into_response(self) -> Response {
        match self {
            ViewError::NotFound => error_response(
                StatusCode::NOT_FOUND,
                "Page Not Found",
                "The page you requested could not be located.",
            ),
            ViewError::BadRequest(msg) => error_response(
                StatusCode::BAD_REQUEST,
                &msg,
                "Please go back and check the form.",
            ),
            ViewError::Redirect(response) => response,
            ViewError::ServiceUnavailable => error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Server exhausted",
                "The server can't handle your request right now. \
                 Please try again later.",
            ),
            ViewError::Err(msg) => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                msg,
                "This is an error in the server code or configuration. \
                 The error has been logged.",
            ),
        }
    }
}

fn error_response(code: StatusCode, message: &str, detail: &str) -> Response {
    Builder::new()
        .status(code)
        .html(|o| templates::error_html(o, code, message, detail))
        .unwrap_or_else(|_| code.into_response())
}

impl From<RenderError> for ViewError {
    fn from(e: RenderError) -> Self {
        error!("Rendering error: {}\n    {:?}", e, e);
        ViewError::Err(GENERIC_ERROR)
    }
}

impl From<StoreError> for ViewError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Pool(e) => {
                warn!("No database connection: {}", e);
                ViewError::ServiceUnavailable
            }
            e => {
                error!("Storage error: {}\n    {:?}", e, e);
                ViewError::Err(GENERIC_ERROR)
            }
        }
    }
}

impl From<geocode::Error> for ViewError {
    fn from(e: geocode::Error) -> Self {
        error!("Geocoding failed: {}", e);
        ViewError::Err(GENERIC_ERROR)
    }
}

impl From<uploads::Error> for ViewError {
    fn from(e: uploads::Error) -> Self {
        if e.is_bad_upload() {
            warn!("Bad upload: {}", e);
            ViewError::BadRequest("Uploaded file is not a supported image".into())
        } else {
            error!("Failed to store image: {}", e);
            ViewError::Err(GENERIC_ERROR)
        }
    }
}

/// Create custom errors for warp rejections.
///
/// Anything unmatched, including a known path with the wrong method,
/// is a 404 page.
pub async fn for_rejection(err: Rejection) -> Result<Response, Rejection> {
    if err.find::<SessionUnavailable>().is_some() {
        Ok(ViewError::ServiceUnavailable.into_response())
    } else if err.find::<PayloadTooLarge>().is_some() {
        Ok(error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            "Upload too large",
            "Please try again with fewer or smaller images.",
        ))
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        Ok(ViewError::BadRequest(e.to_string()).into_response())
    } else if err.find::<UnsupportedMediaType>().is_some() {
        Ok(ViewError::BadRequest("Unexpected form encoding".into())
            .into_response())
    } else if err.is_not_found() || err.find::<MethodNotAllowed>().is_some() {
        Ok(ViewError::NotFound.into_response())
    } else {
        Err(err)
    }
}
