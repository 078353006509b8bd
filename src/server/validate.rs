//! Checking of submitted campground and review forms.
//!
//! All problems with a form are collected, and reported together as a
//! comma separated message.
use super::error::{ViewError, ViewResult};
use super::Result;
use crate::models::{CampgroundChanges, Geometry, NewCampground};
use crate::uploads::Upload;
use bytes::BufMut;
use futures_lite::StreamExt;
use serde::Deserialize;
use std::fmt;
use tracing::warn;
use warp::multipart::{FormData, Part};

const IMAGE_FIELD: &str = "image";
const DELETE_FIELD: &str = "deleteImages[]";

/// The raw content of a submitted campground form.
#[derive(Default)]
pub struct CampgroundParams {
    fields: Vec<(String, String)>,
    images: Vec<Upload>,
    delete_images: Vec<String>,
}

pub async fn read_campground(
    form: Option<FormData>,
) -> Result<CampgroundParams> {
    let Some(form) = form else {
        warn!("Campground form is not multipart/form-data");
        return Err(ViewError::BadRequest("Unexpected form encoding".into()));
    };
    let mut params = CampgroundParams::default();
    let mut parts = Box::pin(form);
    while let Some(part) = parts.next().await {
        let part = part.req("Malformed form data")?;
        let name = part.name().to_string();
        let filename = part.filename().map(String::from);
        let data = read_part(part).await?;
        match name.as_str() {
            IMAGE_FIELD => {
                // An empty file input is submitted as an empty part.
                if !data.is_empty() {
                    params.images.push(Upload {
                        name: filename,
                        data,
                    });
                }
            }
            DELETE_FIELD => params.delete_images.push(utf8(data)?),
            _ => params.fields.push((name, utf8(data)?)),
        }
    }
    Ok(params)
}

async fn read_part(part: Part) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    let mut stream = Box::pin(part.stream());
    while let Some(buf) = stream.next().await {
        data.put(buf.req("Malformed form data")?);
    }
    Ok(data)
}

fn utf8(data: Vec<u8>) -> Result<String> {
    String::from_utf8(data).req("Form field is not utf-8")
}

/// A checked campground form.
pub struct CampgroundForm {
    pub title: String,
    pub location: String,
    pub price: f64,
    pub description: String,
    pub images: Vec<Upload>,
    pub delete_images: Vec<String>,
}

impl CampgroundParams {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn validate(self) -> Result<CampgroundForm, Invalid> {
        let mut errors = Vec::new();
        let title = self.field("campground[title]");
        let location = self.field("campground[location]");
        let price = self.field("campground[price]");
        let description = self.field("campground[description]");
        if [title, location, price, description].iter().all(Option::is_none) {
            return Err(Invalid(vec![required("campground")]));
        }
        let title = text("campground.title", title, &mut errors);
        let location = text("campground.location", location, &mut errors);
        let price = number("campground.price", price, &mut errors);
        if let Some(price) = price {
            at_least("campground.price", price, 0., &mut errors);
        }
        let description =
            text("campground.description", description, &mut errors);
        if !errors.is_empty() {
            return Err(Invalid(errors));
        }
        Ok(CampgroundForm {
            title,
            location,
            // "-0" is a valid price, but must not be shown as $-0.00.
            price: price.filter(|p| *p != 0.).unwrap_or(0.),
            description,
            images: self.images,
            delete_images: self.delete_images,
        })
    }
}

impl CampgroundForm {
    pub fn new_campground(
        &self,
        position: Geometry,
        author_id: i32,
    ) -> NewCampground {
        NewCampground {
            title: self.title.clone(),
            description: self.description.clone(),
            price: self.price,
            location: self.location.clone(),
            longitude: position.longitude(),
            latitude: position.latitude(),
            author_id,
        }
    }

    pub fn changes(&self, position: Option<Geometry>) -> CampgroundChanges {
        CampgroundChanges {
            title: self.title.clone(),
            description: self.description.clone(),
            price: self.price,
            location: self.location.clone(),
            longitude: position.map(|p| p.longitude()),
            latitude: position.map(|p| p.latitude()),
        }
    }
}

/// The raw content of a submitted review form.
#[derive(Debug, Default, Deserialize)]
pub struct ReviewParams {
    #[serde(rename = "review[rating]")]
    rating: Option<String>,
    #[serde(rename = "review[body]")]
    body: Option<String>,
}

pub struct ReviewForm {
    pub rating: i16,
    pub body: String,
}

impl ReviewParams {
    pub fn validate(self) -> Result<ReviewForm, Invalid> {
        if self.rating.is_none() && self.body.is_none() {
            return Err(Invalid(vec![required("review")]));
        }
        let mut errors = Vec::new();
        let rating =
            number("review.rating", self.rating.as_deref(), &mut errors);
        if let Some(rating) = rating {
            if rating.fract() != 0. {
                errors.push("\"review.rating\" must be an integer".into());
            } else {
                at_least("review.rating", rating, 1., &mut errors);
                at_most("review.rating", rating, 5., &mut errors);
            }
        }
        let body = text("review.body", self.body.as_deref(), &mut errors);
        if !errors.is_empty() {
            return Err(Invalid(errors));
        }
        Ok(ReviewForm {
            rating: rating.unwrap_or_default() as i16,
            body,
        })
    }
}

fn required(path: &str) -> String {
    format!("\"{path}\" is required")
}

fn text(path: &str, value: Option<&str>, errors: &mut Vec<String>) -> String {
    match value.map(str::trim) {
        None => errors.push(required(path)),
        Some("") => errors.push(format!("\"{path}\" is not allowed to be empty")),
        Some(value) => return value.into(),
    }
    String::new()
}

fn number(
    path: &str,
    value: Option<&str>,
    errors: &mut Vec<String>,
) -> Option<f64> {
    let Some(value) = value else {
        errors.push(required(path));
        return None;
    };
    match value.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => Some(n),
        _ => {
            errors.push(format!("\"{path}\" must be a number"));
            None
        }
    }
}

fn at_least(path: &str, value: f64, min: f64, errors: &mut Vec<String>) {
    if value < min {
        errors.push(format!(
            "\"{path}\" must be greater than or equal to {min}"
        ));
    }
}

fn at_most(path: &str, value: f64, max: f64, errors: &mut Vec<String>) {
    if value > max {
        errors.push(format!("\"{path}\" must be less than or equal to {max}"));
    }
}

/// The problems found in a form.
#[derive(Debug, PartialEq, Eq)]
pub struct Invalid(Vec<String>);

impl fmt::Display for Invalid {
    fn fmt(&self, out: &mut fmt::Formatter) -> fmt::Result {
        out.write_str(&self.0.join(","))
    }
}

impl From<Invalid> for ViewError {
    fn from(e: Invalid) -> Self {
        warn!("Invalid form: {}", e);
        ViewError::BadRequest(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(fields: &[(&str, &str)]) -> CampgroundParams {
        CampgroundParams {
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    fn message<T>(result: Result<T, Invalid>) -> String {
        match result {
            Ok(_) => panic!("Expected validation to fail"),
            Err(e) => e.to_string(),
        }
    }

    #[test]
    fn valid_campground() {
        let form = params(&[
            ("campground[title]", "Ridge Camp"),
            ("campground[location]", "Denver, CO"),
            ("campground[price]", "25"),
            ("campground[description]", "Windy, but a great view."),
        ])
        .validate()
        .unwrap();
        assert_eq!(form.title, "Ridge Camp");
        assert_eq!(form.price, 25.0);
        assert!(form.images.is_empty());
    }

    #[test]
    fn all_problems_are_reported() {
        let result = params(&[
            ("campground[location]", ""),
            ("campground[price]", "cheap"),
            ("campground[description]", "Nice"),
        ])
        .validate();
        assert_eq!(
            message(result),
            "\"campground.title\" is required,\
             \"campground.location\" is not allowed to be empty,\
             \"campground.price\" must be a number",
        );
    }

    #[test]
    fn negative_price() {
        let result = params(&[
            ("campground[title]", "Ridge Camp"),
            ("campground[location]", "Denver, CO"),
            ("campground[price]", "-1"),
            ("campground[description]", "Nice"),
        ])
        .validate();
        assert_eq!(
            message(result),
            "\"campground.price\" must be greater than or equal to 0",
        );
    }

    #[test]
    fn negative_zero_price_is_zero() {
        let form = params(&[
            ("campground[title]", "Ridge Camp"),
            ("campground[location]", "Denver, CO"),
            ("campground[price]", "-0"),
            ("campground[description]", "Nice"),
        ])
        .validate()
        .unwrap();
        assert_eq!(form.price, 0.0);
        assert!(form.price.is_sign_positive());
    }

    #[test]
    fn missing_campground() {
        assert_eq!(
            message(params(&[]).validate()),
            "\"campground\" is required",
        );
    }

    fn review(rating: Option<&str>, body: Option<&str>) -> ReviewParams {
        ReviewParams {
            rating: rating.map(String::from),
            body: body.map(String::from),
        }
    }

    #[test]
    fn valid_review() {
        let form = review(Some("4"), Some("Lovely")).validate().unwrap();
        assert_eq!(form.rating, 4);
        assert_eq!(form.body, "Lovely");
    }

    #[test]
    fn review_rating_range() {
        assert_eq!(
            message(review(Some("9"), Some("Wow")).validate()),
            "\"review.rating\" must be less than or equal to 5",
        );
        assert_eq!(
            message(review(Some("0"), Some("Meh")).validate()),
            "\"review.rating\" must be greater than or equal to 1",
        );
        assert_eq!(
            message(review(Some("2.5"), Some("Hm")).validate()),
            "\"review.rating\" must be an integer",
        );
        assert_eq!(
            message(review(Some("NaN"), Some("Hm")).validate()),
            "\"review.rating\" must be a number",
        );
    }

    #[test]
    fn review_from_urlencoded() {
        let params: ReviewParams = serde_urlencoded::from_str(
            "review%5Brating%5D=5&review%5Bbody%5D=Great+place",
        )
        .unwrap();
        let form = params.validate().unwrap();
        assert_eq!(form.rating, 5);
        assert_eq!(form.body, "Great place");
    }

    #[test]
    fn empty_review() {
        assert_eq!(
            message(review(None, None).validate()),
            "\"review\" is required",
        );
        assert_eq!(
            message(review(Some("3"), Some("  ")).validate()),
            "\"review.body\" is not allowed to be empty",
        );
    }
}
