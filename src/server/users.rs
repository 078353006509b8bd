use super::error::ViewResult;
use super::{Context, Result};
use crate::models::{FlashKind, NewUser};
use crate::store::StoreError;
use crate::templates::{self, RenderRucte};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use tokio::task::spawn_blocking;
use tracing::info;
use warp::reply::Response;

pub async fn get_register(mut context: Context) -> Result<Response> {
    context.show_flashes().await?;
    Ok(context
        .response()
        .html(|o| templates::register_html(o, &context))?)
}

/// The data submitted by the register form.
/// This does not derive Debug or Serialize, as the password is plain text.
#[derive(Deserialize)]
pub struct RegisterForm {
    username: String,
    email: String,
    password: String,
}

pub async fn post_register(
    mut context: Context,
    form: RegisterForm,
) -> Result<Response> {
    let username = form.username.trim();
    let email = form.email.trim();
    if username.is_empty() || email.is_empty() || form.password.is_empty() {
        return context
            .flash_redirect(
                FlashKind::Error,
                "Username, email and password are all required",
                "/register",
            )
            .await;
    }
    let new = NewUser {
        username: username.into(),
        email: email.into(),
        password: hash_password(form.password).await?,
    };
    match context.repo().create_user(new).await {
        Ok(user) => {
            info!("Registered user {}", user.username);
            context.login(user).await?;
            context
                .flash_redirect(
                    FlashKind::Success,
                    "Welcome to Yelp Camp!",
                    "/campgrounds",
                )
                .await
        }
        Err(StoreError::Conflict(msg)) => {
            info!("Registration failed: {}", msg);
            context
                .flash_redirect(FlashKind::Error, &msg, "/register")
                .await
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn get_login(mut context: Context) -> Result<Response> {
    context.show_flashes().await?;
    Ok(context
        .response()
        .html(|o| templates::login_html(o, &context))?)
}

/// The data submitted by the login form.
/// This does not derive Debug or Serialize, as the password is plain text.
#[derive(Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
}

pub async fn post_login(
    mut context: Context,
    form: LoginForm,
) -> Result<Response> {
    let found = context.repo().user_with_password(&form.username).await?;
    if let Some((user, hash)) = found {
        if check_password(form.password, hash).await? {
            info!("User {} logged in", user.username);
            let next = context
                .take_return_to()
                .and_then(|next| sanitize_next(&next).map(String::from))
                .unwrap_or_else(|| "/campgrounds".into());
            context.login(user).await?;
            return context
                .flash_redirect(FlashKind::Success, "Welcome back!", &next)
                .await;
        }
        info!(
            "Login failed: Password verification failed for {:?}",
            form.username,
        );
    } else {
        info!("Login failed: No hash found for {:?}", form.username);
    }
    context
        .flash_redirect(
            FlashKind::Error,
            "Password or username is incorrect",
            "/login",
        )
        .await
}

pub async fn logout(mut context: Context) -> Result<Response> {
    if let Some(user) = context.user() {
        info!("User {} logged out", user.username);
    }
    context.logout().await?;
    context
        .flash_redirect(FlashKind::Success, "Goodbye!", "/campgrounds")
        .await
}

async fn hash_password(password: String) -> Result<String> {
    spawn_blocking(move || djangohashers::make_password(&password))
        .await
        .ise()
}

async fn check_password(password: String, hash: String) -> Result<bool> {
    spawn_blocking(move || {
        djangohashers::check_password_tolerant(&password, &hash)
    })
    .await
    .ise()
}

/// A local path that is safe to redirect to, or None.
pub fn sanitize_next(next: &str) -> Option<&str> {
    static SAFE: OnceLock<Option<Regex>> = OnceLock::new();
    let safe = SAFE.get_or_init(|| Regex::new(r"^/([a-z0-9._-]+/?)*$").ok());
    match safe {
        Some(re) if re.is_match(next) => Some(next),
        _ => None,
    }
}

#[test]
fn test_sanitize_bad_1() {
    assert_eq!(None, sanitize_next("https://evil.org/"))
}

#[test]
fn test_sanitize_bad_2() {
    assert_eq!(None, sanitize_next("//evil.org/"))
}
#[test]
fn test_sanitize_bad_3() {
    assert_eq!(None, sanitize_next("/evil\"hack"))
}
#[test]
fn test_sanitize_bad_4() {
    assert_eq!(None, sanitize_next("/evil'hack"))
}

#[test]
fn test_sanitize_good_1() {
    assert_eq!(Some("/campgrounds/"), sanitize_next("/campgrounds/"))
}
#[test]
fn test_sanitize_good_2() {
    assert_eq!(Some("/campgrounds/17/edit"), sanitize_next("/campgrounds/17/edit"))
}
