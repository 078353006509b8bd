//! Storage of uploaded campground images.
//!
//! Each upload is stored under a random name, together with a
//! thumbnail [`THUMB_WIDTH`] pixels wide in the [`THUMB_DIR`]
//! subdirectory.  Both are served below `/uploads/`.
use crate::models::{random_token, StoredImage};
use async_trait::async_trait;
use image::imageops::FilterType;
use image::{ImageError, ImageFormat};
use std::path::{Path, PathBuf};
use std::{fmt, fs, io};
use tokio::task::{spawn_blocking, JoinError};
use tracing::{debug, info};

pub const THUMB_DIR: &str = "w_200";
pub const THUMB_WIDTH: u32 = 200;
const URL_PREFIX: &str = "/uploads/";

/// The url of the thumbnail for an image url.
///
/// Urls that are not local uploads are returned unchanged.
pub fn thumbnail_url(url: &str) -> String {
    match url.strip_prefix(URL_PREFIX) {
        Some(name) => format!("{URL_PREFIX}{THUMB_DIR}/{name}"),
        None => url.to_string(),
    }
}

#[derive(clap::Parser)]
pub struct UploadsOpt {
    /// Directory for uploaded images.
    #[clap(long, env = "RCAMP_UPLOADS", default_value = "uploads")]
    pub uploads_dir: PathBuf,
}

/// A file from a submitted form.
pub struct Upload {
    pub name: Option<String>,
    pub data: Vec<u8>,
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn upload(&self, upload: Upload) -> Result<StoredImage, Error>;
    /// Remove a stored image.  Removing a missing image is not an error.
    async fn destroy(&self, filename: &str) -> Result<(), Error>;
}

pub struct UploadsDir {
    basedir: PathBuf,
}

impl UploadsDir {
    pub fn new(basedir: &Path) -> Self {
        UploadsDir {
            basedir: basedir.into(),
        }
    }
}

#[async_trait]
impl ImageStore for UploadsDir {
    async fn upload(&self, upload: Upload) -> Result<StoredImage, Error> {
        let basedir = self.basedir.clone();
        let stored =
            spawn_blocking(move || store_image(&basedir, &upload.data)).await??;
        info!(
            "Stored upload {:?} as {}",
            upload.name.as_deref().unwrap_or("-"),
            stored.filename,
        );
        Ok(stored)
    }

    async fn destroy(&self, filename: &str) -> Result<(), Error> {
        if !is_stored_name(filename) {
            debug!("Not removing {:?}, not a local upload", filename);
            return Ok(());
        }
        let paths = [
            self.basedir.join(filename),
            self.basedir.join(THUMB_DIR).join(filename),
        ];
        for path in paths {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("No {} to remove", path.display())
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// True for names as created by [`store_image`].
fn is_stored_name(filename: &str) -> bool {
    match filename.split_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty()
                && stem.chars().all(|c| c.is_ascii_alphanumeric())
                && extension(ext).is_some()
        }
        None => false,
    }
}

fn extension(ext: &str) -> Option<ImageFormat> {
    match ext {
        "jpg" => Some(ImageFormat::Jpeg),
        "png" => Some(ImageFormat::Png),
        "gif" => Some(ImageFormat::Gif),
        _ => None,
    }
}

fn store_image(basedir: &Path, data: &[u8]) -> Result<StoredImage, Error> {
    let format = image::guess_format(data)?;
    let ext = match format {
        ImageFormat::Jpeg => "jpg",
        ImageFormat::Png => "png",
        ImageFormat::Gif => "gif",
        other => return Err(Error::Unsupported(format!("{other:?}"))),
    };
    let img = image::load_from_memory_with_format(data, format)?;
    let thumbdir = basedir.join(THUMB_DIR);
    fs::create_dir_all(&thumbdir)?;
    let filename = format!("{}.{}", random_token(20), ext);
    fs::write(basedir.join(&filename), data)?;
    let thumb = if img.width() > THUMB_WIDTH {
        img.resize(THUMB_WIDTH, u32::MAX, FilterType::CatmullRom)
    } else {
        img
    };
    thumb.save_with_format(thumbdir.join(&filename), format)?;
    Ok(StoredImage {
        url: format!("{URL_PREFIX}{filename}"),
        filename,
    })
}

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Image(ImageError),
    Unsupported(String),
    Join(JoinError),
}

impl Error {
    /// True if the uploaded data was at fault, rather than the server.
    pub fn is_bad_upload(&self) -> bool {
        matches!(self, Error::Image(_) | Error::Unsupported(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, out: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(out, "I/O error: {e}"),
            Error::Image(e) => write!(out, "Bad image: {e}"),
            Error::Unsupported(f) => write!(out, "Unsupported format {f}"),
            Error::Join(e) => write!(out, "Image task failed: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
impl From<ImageError> for Error {
    fn from(e: ImageError) -> Self {
        Error::Image(e)
    }
}
impl From<JoinError> for Error {
    fn from(e: JoinError) -> Self {
        Error::Join(e)
    }
}
