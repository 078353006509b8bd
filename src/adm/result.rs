use crate::geocode;
use crate::store::StoreError;
use diesel_async::pooled_connection::deadpool::BuildError;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    Pool(BuildError),
    Store(StoreError),
    Geocode(geocode::Error),
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Pool(e) => write!(f, "Failed to create db pool: {e}"),
            Error::Store(e) => write!(f, "{e}"),
            Error::Geocode(e) => write!(f, "Geocoder setup failed: {e}"),
            Error::Other(s) => write!(f, "Error: {s}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<BuildError> for Error {
    fn from(e: BuildError) -> Self {
        Error::Pool(e)
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Error::Store(e)
    }
}

impl From<geocode::Error> for Error {
    fn from(e: geocode::Error) -> Self {
        Error::Geocode(e)
    }
}
