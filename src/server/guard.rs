//! Checks that a request may act on a resource.
//!
//! A failed check is a `ViewError::Redirect`, with a flash message
//! explaining what went wrong already stored in the session.
use super::users::sanitize_next;
use super::{Context, Result, ViewError};
use crate::models::{Campground, FlashKind, Review, User};
use tracing::info;
use warp::http::Method;

const NOT_ALLOWED: &str = "You do not have permission to do that!";

/// The logged in user, or a redirect to the login form.
///
/// For a GET request, the requested path is remembered so the user can
/// get back to it after logging in.
pub async fn is_logged_in(context: &mut Context) -> Result<User> {
    if let Some(user) = context.user() {
        return Ok(user.clone());
    }
    if context.method() == Method::GET {
        if let Some(path) = sanitize_next(context.path()).map(String::from) {
            context.set_return_to(&path).await?;
        }
    }
    let redirect = context
        .flash_redirect(FlashKind::Error, "You must be signed in first!", "/login")
        .await?;
    Err(ViewError::Redirect(redirect))
}

/// The campground `id`, if `user` is its author.
pub async fn is_author(
    context: &mut Context,
    user: &User,
    id: i32,
) -> Result<Campground> {
    let campground = context.repo().campground(id).await?;
    match campground {
        None => Err(missing_campground(context).await?),
        Some(campground) if campground.author_id != user.id => {
            info!("User {} may not change campground #{}", user.username, id);
            let url = campground.url();
            Err(ViewError::Redirect(
                context.flash_redirect(FlashKind::Error, NOT_ALLOWED, &url).await?,
            ))
        }
        Some(campground) => Ok(campground),
    }
}

/// The review `review_id` on campground `id`, if `user` wrote it.
pub async fn is_review_author(
    context: &mut Context,
    user: &User,
    id: i32,
    review_id: i32,
) -> Result<Review> {
    let review = context
        .repo()
        .review(review_id)
        .await?
        .filter(|r| r.campground_id == id);
    let url = format!("/campgrounds/{id}");
    match review {
        None => Err(ViewError::Redirect(
            context
                .flash_redirect(FlashKind::Error, "Cannot find that review!", &url)
                .await?,
        )),
        Some(review) if review.author_id != user.id => {
            info!("User {} may not remove review #{}", user.username, review_id);
            Err(ViewError::Redirect(
                context.flash_redirect(FlashKind::Error, NOT_ALLOWED, &url).await?,
            ))
        }
        Some(review) => Ok(review),
    }
}

/// Redirect to the campground list, telling the user the campground
/// they wanted does not exist.
pub async fn missing_campground(context: &mut Context) -> Result<ViewError> {
    let redirect = context
        .flash_redirect(
            FlashKind::Error,
            "Cannot find that campground!",
            "/campgrounds",
        )
        .await?;
    Ok(ViewError::Redirect(redirect))
}
