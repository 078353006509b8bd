//! Routing on the effective request method.
//!
//! Html forms can only GET or POST, so a POST with a `_method=PUT` or
//! `_method=DELETE` query parameter is routed as that method.
use warp::http::Method;
use warp::{Filter, Rejection};

pub fn post() -> impl Filter<Extract = (), Error = Rejection> + Clone {
    effective(Method::POST)
}

pub fn put() -> impl Filter<Extract = (), Error = Rejection> + Clone {
    effective(Method::PUT)
}

pub fn delete() -> impl Filter<Extract = (), Error = Rejection> + Clone {
    effective(Method::DELETE)
}

fn effective(
    wanted: Method,
) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::method()
        .and(
            warp::query::raw()
                .or(warp::any().map(String::new))
                .unify(),
        )
        .and_then(move |method: Method, query: String| {
            let found = overridden(method, &query) == wanted;
            async move {
                if found {
                    Ok(())
                } else {
                    Err(warp::reject::not_found())
                }
            }
        })
        .untuple_one()
}

/// The method a request should be handled as.
pub fn overridden(method: Method, query: &str) -> Method {
    if method != Method::POST {
        return method;
    }
    serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .ok()
        .and_then(|pairs| pairs.into_iter().find(|(k, _)| k == "_method"))
        .and_then(|(_, v)| match v.to_ascii_uppercase().as_str() {
            "PUT" => Some(Method::PUT),
            "PATCH" => Some(Method::PATCH),
            "DELETE" => Some(Method::DELETE),
            _ => None,
        })
        .unwrap_or(method)
}

#[test]
fn test_override_put() {
    assert_eq!(overridden(Method::POST, "_method=PUT"), Method::PUT)
}
#[test]
fn test_override_delete_lowercase() {
    assert_eq!(overridden(Method::POST, "a=1&_method=delete"), Method::DELETE)
}
#[test]
fn test_override_only_on_post() {
    assert_eq!(overridden(Method::GET, "_method=DELETE"), Method::GET)
}
#[test]
fn test_override_unknown_ignored() {
    assert_eq!(overridden(Method::POST, "_method=TRACE"), Method::POST)
}
#[test]
fn test_no_override() {
    assert_eq!(overridden(Method::POST, ""), Method::POST)
}
