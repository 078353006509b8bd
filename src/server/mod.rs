mod campgrounds;
mod context;
mod error;
mod guard;
mod method;
mod reviews;
mod users;
mod validate;

pub use self::context::{Context, GlobalContext};
use self::error::{for_rejection, ViewError, ViewResult};
use crate::adm::result::Error;
use crate::dbopt::DbOpt;
use crate::geocode::GeocodeOpt;
use crate::store::pg::PgRepo;
use crate::templates::{self, RenderRucte};
use crate::uploads::{UploadsDir, UploadsOpt};
use chrono::Duration;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration as StdDuration, SystemTime};
use tracing::info;
use warp::filters::BoxedFilter;
use warp::http::response::Builder;
use warp::http::{header, StatusCode};
use warp::multipart::{self, FormData};
use warp::reply::Response;
use warp::{self, Filter, Rejection, Reply};

#[derive(clap::Parser)]
pub struct Args {
    #[clap(flatten)]
    db: DbOpt,
    #[clap(flatten)]
    geocode: GeocodeOpt,
    #[clap(flatten)]
    uploads: UploadsOpt,

    /// Socket addess for rcamp to listen on.
    #[clap(long, env = "RCAMP_LISTEN", default_value = "127.0.0.1:3000")]
    listen: SocketAddr,

    /// Days a session is kept without being used.
    #[clap(long, env = "RCAMP_SESSION_DAYS", default_value = "14")]
    session_days: u16,

    /// Largest accepted campground form, in megabytes.
    #[clap(long, default_value = "20")]
    max_upload_mb: u64,
}

pub async fn run(args: &Args) -> Result<(), Error> {
    let store = Arc::new(PgRepo::new(args.db.create_pool()?));
    let global = GlobalContext::new(
        store.clone(),
        store,
        Arc::new(args.geocode.client()?),
        Arc::new(UploadsDir::new(&args.uploads.uploads_dir)),
        Duration::days(args.session_days.into()),
    );
    let routes = routes(
        Arc::new(global),
        args.uploads.uploads_dir.clone(),
        args.max_upload_mb * 1024 * 1024,
    );
    info!("Listening on {}", args.listen);
    warp::serve(routes.with(warp::log::custom(log_request)))
        .run(args.listen)
        .await;
    Ok(())
}

fn log_request(info: warp::log::Info) {
    info!(
        "{} {} {} {:?}",
        info.method(),
        info.path(),
        info.status().as_u16(),
        info.elapsed(),
    );
}

pub fn routes(
    global: Arc<GlobalContext>,
    uploads_dir: PathBuf,
    max_upload: u64,
) -> BoxedFilter<(Response,)> {
    use warp::filters::body;
    use warp::path::{end, param, path};
    let s = context::create_session_filter(global);
    let s = move || s.clone();
    let form = move || campground_form(max_upload);

    let campground_routes = end()
        .and(warp::get())
        .and(s())
        .then(campgrounds::index)
        .or(end()
            .and(method::post())
            .and(s())
            .and(form())
            .then(campgrounds::create))
        .unify()
        .or(path("new")
            .and(end())
            .and(warp::get())
            .and(s())
            .then(campgrounds::new))
        .unify()
        .or(param()
            .and(end())
            .and(warp::get())
            .and(s())
            .then(campgrounds::show))
        .unify()
        .or(param()
            .and(path("edit"))
            .and(end())
            .and(warp::get())
            .and(s())
            .then(campgrounds::edit))
        .unify()
        .or(param()
            .and(end())
            .and(method::put())
            .and(s())
            .and(form())
            .then(campgrounds::update))
        .unify()
        .or(param()
            .and(end())
            .and(method::delete())
            .and(s())
            .then(campgrounds::delete))
        .unify()
        .or(param()
            .and(path("reviews"))
            .and(end())
            .and(method::post())
            .and(s())
            .and(body::form())
            .then(reviews::create))
        .unify()
        .or(param()
            .and(path("reviews"))
            .and(param())
            .and(end())
            .and(method::delete())
            .and(s())
            .then(reviews::delete))
        .unify()
        .map(wrap);

    let user_routes = path("register")
        .and(end())
        .and(warp::get())
        .and(s())
        .then(users::get_register)
        .or(path("register")
            .and(end())
            .and(method::post())
            .and(s())
            .and(body::form())
            .then(users::post_register))
        .unify()
        .or(path("login")
            .and(end())
            .and(warp::get())
            .and(s())
            .then(users::get_login))
        .unify()
        .or(path("login")
            .and(end())
            .and(method::post())
            .and(s())
            .and(body::form())
            .then(users::post_login))
        .unify()
        .or(path("logout")
            .and(end())
            .and(warp::get())
            .and(s())
            .then(users::logout))
        .unify()
        .map(wrap);

    end()
        .and(warp::get())
        .and(s())
        .then(home)
        .map(wrap)
        .or(path("campgrounds").and(campground_routes))
        .unify()
        .or(user_routes)
        .unify()
        .or(path("static")
            .and(param())
            .and(end())
            .and(warp::get())
            .then(static_file)
            .map(wrap))
        .unify()
        .or(path("uploads")
            .and(warp::get())
            .and(warp::fs::dir(uploads_dir))
            .map(|file: warp::fs::File| {
                far_expires(file.into_response())
            }))
        .unify()
        .recover(for_rejection)
        .unify()
        .boxed()
}

/// The multipart body of a campground form.
///
/// A body in any other encoding gives `None`, so the handler can check
/// the login before refusing it.
fn campground_form(
    max_length: u64,
) -> impl Filter<Extract = (Option<FormData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("content-type")
        .and_then(|content_type: Option<String>| async move {
            let multipart = content_type.map_or(false, |t| {
                t.to_ascii_lowercase().starts_with("multipart/form-data")
            });
            if multipart {
                Err(warp::reject::not_found())
            } else {
                Ok::<Option<FormData>, Rejection>(None)
            }
        })
        .or(multipart::form().max_length(max_length).map(Some))
        .unify()
}

type Result<T, E = ViewError> = std::result::Result<T, E>;

fn wrap(result: Result<Response>) -> Response {
    match result {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn home(mut context: Context) -> Result<Response> {
    context.show_flashes().await?;
    Ok(context
        .response()
        .html(|o| templates::home_html(o, &context))?)
}

async fn static_file(name: String) -> Result<Response> {
    use templates::statics::StaticFile;
    let data = StaticFile::get(&name).ok_or(ViewError::NotFound)?;
    Builder::new()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, data.mime.as_ref())
        .body(data.content.into())
        .map(far_expires)
        .ise()
}

fn far_expires(mut response: Response) -> Response {
    let far = SystemTime::now() + StdDuration::from_secs(180 * 24 * 60 * 60);
    if let Ok(value) = httpdate(far).parse() {
        response.headers_mut().insert(header::EXPIRES, value);
    }
    response
}

fn httpdate(time: SystemTime) -> String {
    chrono::DateTime::<chrono::Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}
