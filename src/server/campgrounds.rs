use super::guard::{is_author, is_logged_in, missing_campground};
use super::validate::read_campground;
use super::{Context, Result};
use crate::models::{FlashKind, StoredImage};
use crate::templates::{self, RenderRucte};
use crate::uploads::Upload;
use tracing::{info, warn};
use warp::multipart::FormData;
use warp::reply::Response;

pub async fn index(mut context: Context) -> Result<Response> {
    let campgrounds = context.repo().campgrounds().await?;
    context.show_flashes().await?;
    Ok(context
        .response()
        .html(|o| templates::campgrounds_html(o, &context, &campgrounds))?)
}

pub async fn new(mut context: Context) -> Result<Response> {
    is_logged_in(&mut context).await?;
    context.show_flashes().await?;
    Ok(context
        .response()
        .html(|o| templates::new_campground_html(o, &context))?)
}

pub async fn create(
    mut context: Context,
    form: Option<FormData>,
) -> Result<Response> {
    let user = is_logged_in(&mut context).await?;
    let form = read_campground(form).await?.validate()?;
    let position = context.geocoder().forward(&form.location).await?;
    let new = form.new_campground(position, user.id);
    let images = store_uploads(&context, form.images).await?;
    let created = context.repo().create_campground(new, images.clone()).await;
    let campground = match created {
        Ok(campground) => campground,
        Err(e) => {
            discard_uploads(&context, &images).await;
            return Err(e.into());
        }
    };
    info!("User {} created campground #{}", user.username, campground.id);
    context
        .flash_redirect(
            FlashKind::Success,
            "Successfully made a new campground!",
            &campground.url(),
        )
        .await
}

pub async fn show(id: i32, mut context: Context) -> Result<Response> {
    let details = context.repo().campground_details(id).await?;
    let Some(details) = details else {
        return Err(missing_campground(&mut context).await?);
    };
    context.show_flashes().await?;
    Ok(context
        .response()
        .html(|o| templates::campground_html(o, &context, &details))?)
}

pub async fn edit(id: i32, mut context: Context) -> Result<Response> {
    let user = is_logged_in(&mut context).await?;
    let campground = is_author(&mut context, &user, id).await?;
    let images = context.repo().images(id).await?;
    context.show_flashes().await?;
    Ok(context.response().html(|o| {
        templates::edit_campground_html(o, &context, &campground, &images)
    })?)
}

pub async fn update(
    id: i32,
    mut context: Context,
    form: Option<FormData>,
) -> Result<Response> {
    let user = is_logged_in(&mut context).await?;
    let campground = is_author(&mut context, &user, id).await?;
    let form = read_campground(form).await?.validate()?;
    let position = if form.location != campground.location {
        Some(context.geocoder().forward(&form.location).await?)
    } else {
        None
    };
    let changes = form.changes(position);
    let images = store_uploads(&context, form.images).await?;
    let updated = context
        .repo()
        .update_campground(id, changes, images.clone())
        .await;
    match updated {
        Ok(Some(_)) => (),
        Ok(None) => {
            discard_uploads(&context, &images).await;
            return Err(missing_campground(&mut context).await?);
        }
        Err(e) => {
            discard_uploads(&context, &images).await;
            return Err(e.into());
        }
    }
    if !form.delete_images.is_empty() {
        let doomed = context
            .repo()
            .images(id)
            .await?
            .into_iter()
            .map(|image| image.filename)
            .filter(|name| form.delete_images.contains(name))
            .collect::<Vec<_>>();
        for filename in &doomed {
            context.images().destroy(filename).await?;
        }
        let n = context.repo().remove_images(id, &doomed).await?;
        info!("Removed {} images from campground #{}", n, id);
    }
    context
        .flash_redirect(
            FlashKind::Success,
            "Successfully updated campground!",
            &campground.url(),
        )
        .await
}

pub async fn delete(id: i32, mut context: Context) -> Result<Response> {
    let user = is_logged_in(&mut context).await?;
    is_author(&mut context, &user, id).await?;
    if let Some(images) = context.repo().delete_campground(id).await? {
        info!("User {} deleted campground #{}", user.username, id);
        for image in images {
            if let Err(e) = context.images().destroy(&image.filename).await {
                warn!("Failed to remove image {}: {}", image.filename, e);
            }
        }
    }
    context
        .flash_redirect(
            FlashKind::Success,
            "Successfully deleted campground!",
            "/campgrounds",
        )
        .await
}

/// Store uploaded images, one at a time.
async fn store_uploads(
    context: &Context,
    uploads: Vec<Upload>,
) -> Result<Vec<StoredImage>> {
    let mut stored = Vec::with_capacity(uploads.len());
    for upload in uploads {
        match context.images().upload(upload).await {
            Ok(image) => stored.push(image),
            Err(e) => {
                discard_uploads(context, &stored).await;
                return Err(e.into());
            }
        }
    }
    Ok(stored)
}

/// Remove stored uploads that did not end up in a campground.
async fn discard_uploads(context: &Context, images: &[StoredImage]) {
    for image in images {
        if let Err(e) = context.images().destroy(&image.filename).await {
            warn!("Failed to remove image {}: {}", image.filename, e);
        }
    }
}
