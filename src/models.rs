use crate::schema::{campground_images, campgrounds, reviews, users};
use crate::uploads::thumbnail_url;
use chrono::{Duration, NaiveDateTime, Utc};
use diesel::prelude::*;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
}

/// A user to be created.  The password is already hashed.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// A GeoJSON geometry.  Campgrounds only ever use points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    /// Longitude and latitude, in that order.
    Point([f64; 2]),
}

impl Geometry {
    pub fn longitude(&self) -> f64 {
        match self {
            Geometry::Point([lng, _]) => *lng,
        }
    }
    pub fn latitude(&self) -> f64 {
        match self {
            Geometry::Point([_, lat]) => *lat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = campgrounds)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Campground {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub location: String,
    pub longitude: f64,
    pub latitude: f64,
    pub author_id: i32,
}

impl Campground {
    pub fn geometry(&self) -> Geometry {
        Geometry::Point([self.longitude, self.latitude])
    }
    pub fn url(&self) -> String {
        format!("/campgrounds/{}", self.id)
    }
    pub fn edit_url(&self) -> String {
        format!("/campgrounds/{}/edit", self.id)
    }
    pub fn update_url(&self) -> String {
        format!("/campgrounds/{}?_method=PUT", self.id)
    }
    pub fn delete_url(&self) -> String {
        format!("/campgrounds/{}?_method=DELETE", self.id)
    }
    pub fn reviews_url(&self) -> String {
        format!("/campgrounds/{}/reviews", self.id)
    }
    pub fn price_label(&self) -> String {
        format!("${:.2}", self.price)
    }
    /// Short description for map popups.
    pub fn teaser(&self) -> String {
        let mut chars = self.description.chars();
        let head: String = chars.by_ref().take(20).collect();
        if chars.next().is_some() {
            format!("{head}...")
        } else {
            head
        }
    }
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = campgrounds)]
pub struct NewCampground {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub location: String,
    pub longitude: f64,
    pub latitude: f64,
    pub author_id: i32,
}

/// Field updates for a campground.  The position is only set when
/// the location text changed and had to be looked up again.
#[derive(Debug, Clone, PartialEq, AsChangeset)]
#[diesel(table_name = campgrounds)]
pub struct CampgroundChanges {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub location: String,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = campground_images)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Image {
    pub id: i32,
    pub campground_id: i32,
    pub url: String,
    pub filename: String,
}

impl Image {
    pub fn thumbnail(&self) -> String {
        thumbnail_url(&self.url)
    }
}

/// An image as handed out by an image store, not yet attached to a
/// campground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub url: String,
    pub filename: String,
}

#[derive(Insertable)]
#[diesel(table_name = campground_images)]
pub struct NewImage<'a> {
    pub campground_id: i32,
    pub url: &'a str,
    pub filename: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = reviews)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Review {
    pub id: i32,
    pub campground_id: i32,
    pub author_id: i32,
    pub rating: i16,
    pub body: String,
}

impl Review {
    pub fn delete_url(&self) -> String {
        format!(
            "/campgrounds/{}/reviews/{}?_method=DELETE",
            self.campground_id, self.id,
        )
    }
    pub fn stars(&self) -> String {
        let rating = self.rating.clamp(0, 5) as usize;
        format!("{}{}", "\u{2605}".repeat(rating), "\u{2606}".repeat(5 - rating))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = reviews)]
pub struct NewReview {
    pub campground_id: i32,
    pub author_id: i32,
    pub rating: i16,
    pub body: String,
}

/// Everything shown on the campground page, with the author of the
/// campground and of each review resolved.
#[derive(Debug, Clone)]
pub struct CampgroundDetails {
    pub campground: Campground,
    pub author: User,
    pub images: Vec<Image>,
    pub reviews: Vec<(Review, User)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    pub fn css_class(self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
        }
    }
}

/// A message to show once, on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    /// Where to go after logging in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_to: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flash: Vec<Flash>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub user_id: Option<i32>,
    pub data: SessionData,
    pub expires_at: NaiveDateTime,
}

impl Session {
    pub fn new(ttl: Duration) -> Self {
        Session {
            id: random_token(32),
            user_id: None,
            data: SessionData::default(),
            expires_at: Utc::now().naive_utc() + ttl,
        }
    }
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now().naive_utc()
    }
}

pub fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
