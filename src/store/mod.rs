//! Persistence of campgrounds, reviews, users and sessions.
//!
//! Handlers only see the [`Repo`] and [`SessionStore`] traits.  The
//! postgres implementation is in [`pg`]; tests use an in-memory store.
#[cfg(test)]
pub mod memory;
pub mod pg;

use crate::models::{
    Campground, CampgroundChanges, CampgroundDetails, Image, NewCampground,
    NewReview, NewUser, Review, Session, StoredImage, User,
};
use async_trait::async_trait;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::fmt;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum StoreError {
    /// No connection could be had from the pool.
    Pool(String),
    Db(DieselError),
    /// A unique constraint was violated.  The message is fit for users.
    Conflict(String),
    Encoding(serde_json::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, out: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreError::Pool(e) => write!(out, "Database pool error: {e}"),
            StoreError::Db(e) => write!(out, "Database error: {e}"),
            StoreError::Conflict(msg) => out.write_str(msg),
            StoreError::Encoding(e) => {
                write!(out, "Failed to encode session data: {e}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<DieselError> for StoreError {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::Conflict(info.message().to_string())
            }
            e => StoreError::Db(e),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Encoding(e)
    }
}

#[async_trait]
pub trait Repo: Send + Sync {
    /// All campgrounds, oldest first, each with its images.
    async fn campgrounds(&self) -> Result<Vec<(Campground, Vec<Image>)>>;
    async fn campground(&self, id: i32) -> Result<Option<Campground>>;
    /// The images of a campground, in upload order.
    async fn images(&self, campground: i32) -> Result<Vec<Image>>;
    /// A campground with its author, images, reviews and review authors.
    async fn campground_details(
        &self,
        id: i32,
    ) -> Result<Option<CampgroundDetails>>;
    async fn create_campground(
        &self,
        campground: NewCampground,
        images: Vec<StoredImage>,
    ) -> Result<Campground>;
    /// Apply `changes` and append `images`.
    async fn update_campground(
        &self,
        id: i32,
        changes: CampgroundChanges,
        images: Vec<StoredImage>,
    ) -> Result<Option<Campground>>;
    /// Detach the images with the given storage names from a
    /// campground.  Names belonging to other campgrounds are ignored.
    async fn remove_images(
        &self,
        campground: i32,
        filenames: &[String],
    ) -> Result<usize>;
    /// Delete a campground together with its reviews and image rows.
    ///
    /// Returns the images the campground had, so the stored files can
    /// be removed, or `None` if there was no such campground.
    async fn delete_campground(&self, id: i32) -> Result<Option<Vec<Image>>>;
    /// Delete every campground, review and image row.
    async fn clear_campgrounds(&self) -> Result<usize>;

    async fn review(&self, id: i32) -> Result<Option<Review>>;
    async fn create_review(&self, review: NewReview) -> Result<Review>;
    async fn delete_review(
        &self,
        campground: i32,
        review: i32,
    ) -> Result<bool>;

    async fn user(&self, id: i32) -> Result<Option<User>>;
    async fn users(&self) -> Result<Vec<User>>;
    /// A user and the password hash, for login.
    async fn user_with_password(
        &self,
        username: &str,
    ) -> Result<Option<(User, String)>>;
    /// Create a user.  A taken username or email is a `Conflict`.
    async fn create_user(&self, user: NewUser) -> Result<User>;
    /// Returns false if there is no such user.
    async fn set_password(&self, username: &str, hash: &str) -> Result<bool>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session, unless it is missing or expired.
    async fn load(&self, id: &str) -> Result<Option<Session>>;
    /// Create or replace a session.
    async fn save(&self, session: &Session) -> Result<()>;
    async fn destroy(&self, id: &str) -> Result<()>;
    /// Remove all expired sessions, returning how many there were.
    async fn purge_expired(&self) -> Result<usize>;
}

const USERNAME_TAKEN: &str = "A user with the given username is already registered";
const EMAIL_TAKEN: &str = "A user with the given email is already registered";

/// Group images by campground, keeping the order of `campgrounds`.
fn with_images(
    campgrounds: Vec<Campground>,
    images: Vec<Image>,
) -> Vec<(Campground, Vec<Image>)> {
    let mut result = campgrounds
        .into_iter()
        .map(|c| (c, Vec::new()))
        .collect::<Vec<_>>();
    for image in images {
        if let Some((_, list)) =
            result.iter_mut().find(|(c, _)| c.id == image.campground_id)
        {
            list.push(image);
        }
    }
    result
}
