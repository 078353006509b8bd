use super::guard::{is_logged_in, is_review_author, missing_campground};
use super::validate::ReviewParams;
use super::{Context, Result};
use crate::models::{FlashKind, NewReview};
use tracing::info;
use warp::reply::Response;

pub async fn create(
    id: i32,
    mut context: Context,
    params: ReviewParams,
) -> Result<Response> {
    let user = is_logged_in(&mut context).await?;
    let form = params.validate()?;
    let campground = context.repo().campground(id).await?;
    let Some(campground) = campground else {
        return Err(missing_campground(&mut context).await?);
    };
    let review = context
        .repo()
        .create_review(NewReview {
            campground_id: campground.id,
            author_id: user.id,
            rating: form.rating,
            body: form.body,
        })
        .await?;
    info!(
        "User {} reviewed campground #{} as #{}",
        user.username, campground.id, review.id,
    );
    context
        .flash_redirect(FlashKind::Success, "Created new review!", &campground.url())
        .await
}

pub async fn delete(
    id: i32,
    review_id: i32,
    mut context: Context,
) -> Result<Response> {
    let user = is_logged_in(&mut context).await?;
    is_review_author(&mut context, &user, id, review_id).await?;
    if context.repo().delete_review(id, review_id).await? {
        info!("User {} deleted review #{}", user.username, review_id);
    }
    context
        .flash_redirect(
            FlashKind::Success,
            "Successfully deleted review!",
            &format!("/campgrounds/{id}"),
        )
        .await
}
