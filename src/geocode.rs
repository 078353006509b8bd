//! Look up map positions for free-text locations.
use crate::models::Geometry;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::debug;

#[derive(clap::Parser)]
pub struct GeocodeOpt {
    /// Access token for the mapbox geocoding api.
    #[clap(long, env = "MAPBOX_TOKEN", hide_env_values = true)]
    mapbox_token: String,
    /// Base url of the forward geocoding endpoint.
    #[clap(
        long,
        env = "RCAMP_GEOCODER_URL",
        default_value = "https://api.mapbox.com/geocoding/v5/mapbox.places/"
    )]
    geocoder_url: String,
}

impl GeocodeOpt {
    pub fn client(&self) -> Result<Mapbox, Error> {
        Mapbox::new(&self.geocoder_url, &self.mapbox_token)
    }
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// The single best match for `query`.
    async fn forward(&self, query: &str) -> Result<Geometry, Error>;
}

pub struct Mapbox {
    client: Client,
    base: Url,
    token: String,
}

impl Mapbox {
    pub fn new(base: &str, token: &str) -> Result<Self, Error> {
        let client = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION"),
            ))
            .timeout(Duration::from_secs(10))
            .build()?;
        let base = Url::parse(base)
            .map_err(|e| Error::BadUrl(format!("{base:?}: {e}")))?;
        Ok(Mapbox {
            client,
            base,
            token: token.into(),
        })
    }

    fn url_for(&self, query: &str) -> Result<Url, Error> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| Error::BadUrl(self.base.to_string()))?
            .pop_if_empty()
            .push(&format!("{query}.json"));
        url.query_pairs_mut()
            .append_pair("access_token", &self.token)
            .append_pair("limit", "1");
        Ok(url)
    }
}

#[async_trait]
impl Geocoder for Mapbox {
    async fn forward(&self, query: &str) -> Result<Geometry, Error> {
        debug!("Geocoding {:?}", query);
        let places = self
            .client
            .get(self.url_for(query)?)
            .send()
            .await?
            .error_for_status()?
            .json::<FeatureCollection>()
            .await?;
        best_match(places, query)
    }
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Geometry,
}

fn best_match(places: FeatureCollection, query: &str) -> Result<Geometry, Error> {
    places
        .features
        .into_iter()
        .next()
        .map(|f| f.geometry)
        .ok_or_else(|| Error::NoMatch(query.into()))
}

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    BadUrl(String),
    NoMatch(String),
}

impl fmt::Display for Error {
    fn fmt(&self, out: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Http(e) => write!(out, "Geocoder request failed: {e}"),
            Error::BadUrl(url) => write!(out, "Bad geocoder url {url}"),
            Error::NoMatch(q) => write!(out, "No place found for {q:?}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}
