use super::error::ViewResult;
use super::Result;
use crate::geocode::Geocoder;
use crate::models::{Flash, FlashKind, Session, User};
use crate::store::{Repo, SessionStore, StoreError};
use crate::uploads::ImageStore;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error};
use warp::filters::{cookie, BoxedFilter};
use warp::http::response::Builder;
use warp::http::{header, Method, StatusCode};
use warp::path::{self, FullPath};
use warp::reply::Response;
use warp::{self, Filter};

pub type ContextFilter = BoxedFilter<(Context,)>;

pub const SESSION_COOKIE: &str = "rcamp_session";

/// Rejection for when the session store can't be reached.
#[derive(Debug)]
pub struct SessionUnavailable;
impl warp::reject::Reject for SessionUnavailable {}

pub fn create_session_filter(global: Arc<GlobalContext>) -> ContextFilter {
    warp::any()
        .and(warp::method())
        .and(path::full())
        .and(cookie::optional(SESSION_COOKIE))
        .and_then(move |method, path: FullPath, sid: Option<String>| {
            let global = global.clone();
            async move {
                Context::load(global, method, path.as_str(), sid)
                    .await
                    .map_err(|e| {
                        error!("Failed to load session: {}", e);
                        warp::reject::custom(SessionUnavailable)
                    })
            }
        })
        .boxed()
}

/// Everything shared between requests.
// Does _not_ derive debug or clone, since it contains connection pools.
pub struct GlobalContext {
    repo: Arc<dyn Repo>,
    sessions: Arc<dyn SessionStore>,
    geocoder: Arc<dyn Geocoder>,
    images: Arc<dyn ImageStore>,
    session_ttl: Duration,
}

impl GlobalContext {
    pub fn new(
        repo: Arc<dyn Repo>,
        sessions: Arc<dyn SessionStore>,
        geocoder: Arc<dyn Geocoder>,
        images: Arc<dyn ImageStore>,
        session_ttl: Duration,
    ) -> Self {
        GlobalContext {
            repo,
            sessions,
            geocoder,
            images,
            session_ttl,
        }
    }
}

/// The request context, providing storage, the session and the
/// logged in user, if any.
pub struct Context {
    global: Arc<GlobalContext>,
    method: Method,
    path: String,
    session: Session,
    /// True if the client doesn't know the current session id.
    new_session: bool,
    /// True if the session was written, so the cookie is refreshed.
    send_cookie: bool,
    user: Option<User>,
    flashes: Vec<Flash>,
}

impl Context {
    async fn load(
        global: Arc<GlobalContext>,
        method: Method,
        path: &str,
        sid: Option<String>,
    ) -> Result<Context, StoreError> {
        let stored = match sid {
            Some(sid) => global.sessions.load(&sid).await?,
            None => None,
        };
        let new_session = stored.is_none();
        let session =
            stored.unwrap_or_else(|| Session::new(global.session_ttl));
        let user = match session.user_id {
            Some(id) => global.repo.user(id).await?,
            None => None,
        };
        Ok(Context {
            global,
            method,
            path: path.into(),
            session,
            new_session,
            send_cookie: false,
            user,
            flashes: Vec::new(),
        })
    }

    pub fn repo(&self) -> &dyn Repo {
        &*self.global.repo
    }
    pub fn geocoder(&self) -> &dyn Geocoder {
        &*self.global.geocoder
    }
    pub fn images(&self) -> &dyn ImageStore {
        &*self.global.images
    }
    pub fn method(&self) -> &Method {
        &self.method
    }
    pub fn path(&self) -> &str {
        &self.path
    }
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }
    pub fn is_authorized(&self) -> bool {
        self.user.is_some()
    }
    /// True if a user is logged in and has the id `author_id`.
    pub fn is_author_of(&self, author_id: i32) -> bool {
        self.user.as_ref().map_or(false, |u| u.id == author_id)
    }
    /// Flash messages to show on this response.
    pub fn flashes(&self) -> &[Flash] {
        &self.flashes
    }

    /// Move pending flash messages out of the session, to be shown on
    /// the page rendered for this request.
    pub async fn show_flashes(&mut self) -> Result<()> {
        if self.session.data.flash.is_empty() {
            return Ok(());
        }
        self.flashes = std::mem::take(&mut self.session.data.flash);
        self.save_session().await
    }

    async fn save_session(&mut self) -> Result<()> {
        self.session.expires_at =
            Utc::now().naive_utc() + self.global.session_ttl;
        self.global.sessions.save(&self.session).await?;
        // The cookie expiry follows the stored expiry.
        self.send_cookie = true;
        Ok(())
    }

    /// Store a flash message for the next rendered page.
    pub async fn flash(&mut self, kind: FlashKind, message: &str) -> Result<()> {
        self.session.data.flash.push(Flash {
            kind,
            message: message.into(),
        });
        self.save_session().await
    }

    pub async fn set_return_to(&mut self, path: &str) -> Result<()> {
        self.session.data.return_to = Some(path.into());
        self.save_session().await
    }

    /// Take the stored return path.  Saved with the next session write.
    pub fn take_return_to(&mut self) -> Option<String> {
        self.session.data.return_to.take()
    }

    /// Bind the session to `user`, under a new session id.
    pub async fn login(&mut self, user: User) -> Result<()> {
        let fresh = Session::new(self.global.session_ttl);
        let old = std::mem::replace(&mut self.session, fresh);
        if !self.new_session {
            self.global.sessions.destroy(&old.id).await?;
        }
        self.session.data = old.data;
        self.session.user_id = Some(user.id);
        self.new_session = true;
        debug!("User #{} got a new session", user.id);
        self.user = Some(user);
        self.save_session().await
    }

    /// Forget the stored session and start an empty one.
    pub async fn logout(&mut self) -> Result<()> {
        if !self.new_session {
            self.global.sessions.destroy(&self.session.id).await?;
        }
        self.session = Session::new(self.global.session_ttl);
        self.new_session = true;
        self.user = None;
        Ok(())
    }

    /// A response builder, with the session cookie if needed.
    pub fn response(&self) -> Builder {
        let builder = Builder::new();
        if self.send_cookie {
            builder.header(
                header::SET_COOKIE,
                format!(
                    "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
                    SESSION_COOKIE,
                    self.session.id,
                    self.global.session_ttl.num_seconds(),
                ),
            )
        } else {
            builder
        }
    }

    pub fn redirect(&self, url: &str) -> Result<Response> {
        self.response()
            .status(StatusCode::FOUND)
            .header(header::LOCATION, url)
            .body(format!("Please refer to {url}").into())
            .ise()
    }

    pub async fn flash_redirect(
        &mut self,
        kind: FlashKind,
        message: &str,
        url: &str,
    ) -> Result<Response> {
        self.flash(kind, message).await?;
        self.redirect(url)
    }
}
