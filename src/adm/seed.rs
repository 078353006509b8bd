//! Replace all campgrounds with generated sample data.
use super::result::Error;
use crate::dbopt::DbOpt;
use crate::models::{NewCampground, StoredImage};
use crate::store::pg::PgRepo;
use crate::store::Repo;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(clap::Parser)]
pub struct Args {
    #[clap(flatten)]
    db: DbOpt,

    /// Username of the author of the generated campgrounds.
    #[clap(long, default_value = "admin")]
    author: String,

    /// Number of campgrounds to create.
    #[clap(long, short, default_value = "50")]
    count: usize,

    /// Unsplash access key.  If given, each campground gets a photo.
    #[clap(long, env = "UNSPLASH_ACCESS_KEY", hide_env_values = true)]
    unsplash_key: Option<String>,

    /// Unsplash collection to pick photos from.
    #[clap(long, default_value = "483251")]
    collection: String,
}

pub async fn run(args: &Args) -> Result<(), Error> {
    let repo = PgRepo::new(args.db.create_pool()?);
    let photos = match &args.unsplash_key {
        Some(key) => Some(Unsplash::new(key, &args.collection)?),
        None => None,
    };
    let n = seed(&repo, &args.author, args.count, photos.as_ref()).await?;
    println!("Created {n} campgrounds by {:?}", args.author);
    Ok(())
}

async fn seed(
    repo: &dyn Repo,
    author: &str,
    count: usize,
    photos: Option<&Unsplash>,
) -> Result<usize, Error> {
    let (author, _) = repo.user_with_password(author).await?.ok_or_else(|| {
        Error::Other(format!("No user {author:?}, create it with userpass"))
    })?;
    let removed = repo.clear_campgrounds().await?;
    info!("Removed {} old campgrounds", removed);
    for _ in 0..count {
        let campground = random_campground(&mut rand::thread_rng(), author.id);
        let images = match photos {
            Some(photos) => photos.random().await.into_iter().collect(),
            None => Vec::new(),
        };
        let campground = repo.create_campground(campground, images).await?;
        debug!("Created #{} {:?}", campground.id, campground.title);
    }
    Ok(count)
}

fn random_campground(rng: &mut impl Rng, author_id: i32) -> NewCampground {
    let fallback = &("Boulder", "CO", 40.015, -105.2705);
    let (city, state, latitude, longitude) = CITIES.choose(rng).unwrap_or(fallback);
    let descriptor = DESCRIPTORS.choose(rng).unwrap_or(&"Quiet");
    let place = PLACES.choose(rng).unwrap_or(&"Camp");
    NewCampground {
        title: format!("{descriptor} {place}"),
        description: DESCRIPTION.into(),
        price: f64::from(rng.gen_range(10..30_i32)),
        location: format!("{city}, {state}"),
        longitude: *longitude,
        latitude: *latitude,
        author_id,
    }
}

/// Client for random photos from unsplash.
struct Unsplash {
    client: Client,
    key: String,
    collection: String,
}

#[derive(Deserialize)]
struct Photo {
    id: String,
    urls: PhotoUrls,
}

#[derive(Deserialize)]
struct PhotoUrls {
    small: String,
}

impl Unsplash {
    fn new(key: &str, collection: &str) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Other(format!("Http client: {e}")))?;
        Ok(Unsplash {
            client,
            key: key.into(),
            collection: collection.into(),
        })
    }

    /// A random photo.  Failures are logged and give no photo.
    async fn random(&self) -> Option<StoredImage> {
        let photo = self
            .client
            .get("https://api.unsplash.com/photos/random")
            .query(&[
                ("client_id", self.key.as_str()),
                ("collections", self.collection.as_str()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status());
        let photo = match photo {
            Ok(response) => response.json::<Photo>().await,
            Err(e) => Err(e),
        };
        match photo {
            Ok(photo) => Some(StoredImage {
                url: photo.urls.small,
                filename: format!("unsplash-{}", photo.id),
            }),
            Err(e) => {
                warn!("Failed to get a photo from unsplash: {}", e);
                None
            }
        }
    }
}

const DESCRIPTION: &str = "Lorem ipsum dolor sit amet, consectetur \
    adipiscing elit. Quisque faucibus ex sapien vitae pellentesque sem \
    placerat. In id cursus mi pretium tellus duis convallis. Tempus leo eu \
    aenean sed diam urna tempor.";

const DESCRIPTORS: &[&str] = &[
    "Forest", "Ancient", "Petrified", "Roaring", "Cascade", "Tumbling",
    "Silent", "Redwood", "Bullfrog", "Maple", "Misty", "Elk", "Grizzly",
    "Ocean", "Sea", "Sky", "Dusty", "Diamond",
];

const PLACES: &[&str] = &[
    "Flats", "Village", "Canyon", "Pond", "Group Camp", "Horse Camp",
    "Ghost Town", "Camp", "Dispersed Camp", "Backcountry", "River", "Creek",
    "Creekside", "Bay", "Spring", "Bayshore", "Sands", "Mule Camp",
    "Hunting Camp", "Cliffs", "Hollow",
];

/// City, state, latitude and longitude.
const CITIES: &[(&str, &str, f64, f64)] = &[
    ("New York", "NY", 40.7128, -74.0059),
    ("Los Angeles", "CA", 34.0522, -118.2437),
    ("Chicago", "IL", 41.8781, -87.6297),
    ("Houston", "TX", 29.7604, -95.3698),
    ("Phoenix", "AZ", 33.4484, -112.0740),
    ("Philadelphia", "PA", 39.9526, -75.1652),
    ("San Antonio", "TX", 29.4241, -98.4936),
    ("San Diego", "CA", 32.7157, -117.1611),
    ("Dallas", "TX", 32.7767, -96.7970),
    ("San Jose", "CA", 37.3382, -121.8863),
    ("Austin", "TX", 30.2672, -97.7431),
    ("Jacksonville", "FL", 30.3322, -81.6557),
    ("Columbus", "OH", 39.9612, -82.9988),
    ("Charlotte", "NC", 35.2271, -80.8431),
    ("Indianapolis", "IN", 39.7684, -86.1581),
    ("Seattle", "WA", 47.6062, -122.3321),
    ("Denver", "CO", 39.7392, -104.9903),
    ("Nashville", "TN", 36.1627, -86.7816),
    ("El Paso", "TX", 31.7619, -106.4850),
    ("Boston", "MA", 42.3601, -71.0589),
    ("Portland", "OR", 45.5051, -122.6750),
    ("Las Vegas", "NV", 36.1699, -115.1398),
    ("Detroit", "MI", 42.3314, -83.0458),
    ("Memphis", "TN", 35.1495, -90.0490),
    ("Louisville", "KY", 38.2527, -85.7585),
    ("Baltimore", "MD", 39.2904, -76.6122),
    ("Milwaukee", "WI", 43.0389, -87.9065),
    ("Albuquerque", "NM", 35.0844, -106.6504),
    ("Tucson", "AZ", 32.2226, -110.9747),
    ("Fresno", "CA", 36.7378, -119.7871),
    ("Sacramento", "CA", 38.5816, -121.4944),
    ("Kansas City", "MO", 39.0997, -94.5786),
    ("Atlanta", "GA", 33.7490, -84.3880),
    ("Omaha", "NE", 41.2565, -95.9345),
    ("Raleigh", "NC", 35.7796, -78.6382),
    ("Miami", "FL", 25.7617, -80.1918),
    ("Minneapolis", "MN", 44.9778, -93.2650),
    ("Salt Lake City", "UT", 40.7608, -111.8910),
    ("Boise", "ID", 43.6150, -116.2023),
    ("Anchorage", "AK", 61.2181, -149.9003),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use crate::store::memory::MemoryStore;

    #[test]
    fn generated_campgrounds_are_plausible() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let camp = random_campground(&mut rng, 3);
            assert!((10.0..30.0).contains(&camp.price));
            assert!(camp.title.contains(' '));
            assert!(CITIES.iter().any(|(city, state, lat, lng)| {
                camp.location == format!("{city}, {state}")
                    && camp.latitude == *lat
                    && camp.longitude == *lng
            }));
            assert_eq!(camp.author_id, 3);
        }
    }

    #[tokio::test]
    async fn seed_replaces_campgrounds() {
        let store = MemoryStore::default();
        let author = store
            .create_user(NewUser {
                username: "admin".into(),
                email: "admin@example.com".into(),
                password: "!".into(),
            })
            .await
            .unwrap();
        seed(&store, "admin", 5, None).await.unwrap();
        seed(&store, "admin", 3, None).await.unwrap();
        let all = store.campgrounds().await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|(c, _)| c.author_id == author.id));
    }

    #[tokio::test]
    async fn seed_needs_author() {
        let store = MemoryStore::default();
        assert!(seed(&store, "nobody", 5, None).await.is_err());
    }
}
