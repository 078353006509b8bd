//! In-memory storage for tests.
use super::{
    with_images, Repo, Result, SessionStore, StoreError, EMAIL_TAKEN,
    USERNAME_TAKEN,
};
use crate::models::{
    Campground, CampgroundChanges, CampgroundDetails, Image, NewCampground,
    NewReview, NewUser, Review, Session, StoredImage, User,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    broken: AtomicBool,
}

#[derive(Default)]
struct State {
    next_id: i32,
    users: Vec<(User, String)>,
    campgrounds: Vec<Campground>,
    images: Vec<Image>,
    reviews: Vec<Review>,
    sessions: HashMap<String, Session>,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
    fn attach(&mut self, campground_id: i32, images: Vec<StoredImage>) {
        for StoredImage { url, filename } in images {
            let id = self.next_id();
            self.images.push(Image {
                id,
                campground_id,
                url,
                filename,
            });
        }
    }
    fn user(&self, id: i32) -> Option<User> {
        self.users
            .iter()
            .find(|(u, _)| u.id == id)
            .map(|(u, _)| u.clone())
    }
}

impl MemoryStore {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("memory store lock")
    }
    /// All reviews, in any campground.
    pub fn all_reviews(&self) -> Vec<Review> {
        self.state().reviews.clone()
    }
    /// A stored session, expired or not.
    pub fn session(&self, id: &str) -> Option<Session> {
        self.state().sessions.get(id).cloned()
    }
    /// Make creating and updating campgrounds fail from now on.
    pub fn break_campground_writes(&self) {
        self.broken.store(true, Ordering::Relaxed);
    }
    fn check_writable(&self) -> Result<()> {
        if self.broken.load(Ordering::Relaxed) {
            return Err(StoreError::Pool("campground writes disabled".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Repo for MemoryStore {
    async fn campgrounds(&self) -> Result<Vec<(Campground, Vec<Image>)>> {
        let state = self.state();
        Ok(with_images(state.campgrounds.clone(), state.images.clone()))
    }

    async fn campground(&self, id: i32) -> Result<Option<Campground>> {
        Ok(self.state().campgrounds.iter().find(|c| c.id == id).cloned())
    }

    async fn images(&self, campground: i32) -> Result<Vec<Image>> {
        Ok(self
            .state()
            .images
            .iter()
            .filter(|i| i.campground_id == campground)
            .cloned()
            .collect())
    }

    async fn campground_details(
        &self,
        id: i32,
    ) -> Result<Option<CampgroundDetails>> {
        let state = self.state();
        let Some(campground) =
            state.campgrounds.iter().find(|c| c.id == id).cloned()
        else {
            return Ok(None);
        };
        let author = state
            .user(campground.author_id)
            .ok_or(StoreError::Db(diesel::result::Error::NotFound))?;
        let images = state
            .images
            .iter()
            .filter(|i| i.campground_id == id)
            .cloned()
            .collect();
        let reviews = state
            .reviews
            .iter()
            .filter(|r| r.campground_id == id)
            .filter_map(|r| Some((r.clone(), state.user(r.author_id)?)))
            .collect();
        Ok(Some(CampgroundDetails {
            campground,
            author,
            images,
            reviews,
        }))
    }

    async fn create_campground(
        &self,
        new: NewCampground,
        images: Vec<StoredImage>,
    ) -> Result<Campground> {
        self.check_writable()?;
        let mut state = self.state();
        let campground = Campground {
            id: state.next_id(),
            title: new.title,
            description: new.description,
            price: new.price,
            location: new.location,
            longitude: new.longitude,
            latitude: new.latitude,
            author_id: new.author_id,
        };
        state.campgrounds.push(campground.clone());
        state.attach(campground.id, images);
        Ok(campground)
    }

    async fn update_campground(
        &self,
        id: i32,
        changes: CampgroundChanges,
        images: Vec<StoredImage>,
    ) -> Result<Option<Campground>> {
        self.check_writable()?;
        let mut state = self.state();
        let Some(campground) = state.campgrounds.iter_mut().find(|c| c.id == id)
        else {
            return Ok(None);
        };
        campground.title = changes.title;
        campground.description = changes.description;
        campground.price = changes.price;
        campground.location = changes.location;
        if let Some(longitude) = changes.longitude {
            campground.longitude = longitude;
        }
        if let Some(latitude) = changes.latitude {
            campground.latitude = latitude;
        }
        let campground = campground.clone();
        state.attach(id, images);
        Ok(Some(campground))
    }

    async fn remove_images(
        &self,
        campground: i32,
        filenames: &[String],
    ) -> Result<usize> {
        let mut state = self.state();
        let before = state.images.len();
        state.images.retain(|i| {
            i.campground_id != campground || !filenames.contains(&i.filename)
        });
        Ok(before - state.images.len())
    }

    async fn delete_campground(&self, id: i32) -> Result<Option<Vec<Image>>> {
        let mut state = self.state();
        let Some(pos) = state.campgrounds.iter().position(|c| c.id == id)
        else {
            return Ok(None);
        };
        state.campgrounds.remove(pos);
        state.reviews.retain(|r| r.campground_id != id);
        let (gone, kept): (Vec<Image>, Vec<Image>) = std::mem::take(&mut state.images)
            .into_iter()
            .partition(|i| i.campground_id == id);
        state.images = kept;
        Ok(Some(gone))
    }

    async fn clear_campgrounds(&self) -> Result<usize> {
        let mut state = self.state();
        state.reviews.clear();
        state.images.clear();
        Ok(std::mem::take(&mut state.campgrounds).len())
    }

    async fn review(&self, id: i32) -> Result<Option<Review>> {
        Ok(self.state().reviews.iter().find(|r| r.id == id).cloned())
    }

    async fn create_review(&self, new: NewReview) -> Result<Review> {
        let mut state = self.state();
        let review = Review {
            id: state.next_id(),
            campground_id: new.campground_id,
            author_id: new.author_id,
            rating: new.rating,
            body: new.body,
        };
        state.reviews.push(review.clone());
        Ok(review)
    }

    async fn delete_review(
        &self,
        campground: i32,
        review: i32,
    ) -> Result<bool> {
        let mut state = self.state();
        let before = state.reviews.len();
        state
            .reviews
            .retain(|r| r.id != review || r.campground_id != campground);
        Ok(state.reviews.len() < before)
    }

    async fn user(&self, id: i32) -> Result<Option<User>> {
        Ok(self.state().user(id))
    }

    async fn users(&self) -> Result<Vec<User>> {
        let mut users = self
            .state()
            .users
            .iter()
            .map(|(u, _)| u.clone())
            .collect::<Vec<_>>();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn user_with_password(
        &self,
        username: &str,
    ) -> Result<Option<(User, String)>> {
        Ok(self
            .state()
            .users
            .iter()
            .find(|(u, _)| u.username == username)
            .cloned())
    }

    async fn create_user(&self, new: NewUser) -> Result<User> {
        let mut state = self.state();
        if state.users.iter().any(|(u, _)| u.username == new.username) {
            return Err(StoreError::Conflict(USERNAME_TAKEN.into()));
        }
        if state.users.iter().any(|(u, _)| u.email == new.email) {
            return Err(StoreError::Conflict(EMAIL_TAKEN.into()));
        }
        let user = User {
            id: state.next_id(),
            username: new.username,
            email: new.email,
        };
        state.users.push((user.clone(), new.password));
        Ok(user)
    }

    async fn set_password(&self, username: &str, hash: &str) -> Result<bool> {
        let mut state = self.state();
        match state.users.iter_mut().find(|(u, _)| u.username == username) {
            Some((_, password)) => {
                *password = hash.into();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, id: &str) -> Result<Option<Session>> {
        Ok(self
            .state()
            .sessions
            .get(id)
            .filter(|s| !s.is_expired())
            .cloned())
    }

    async fn save(&self, session: &Session) -> Result<()> {
        self.state()
            .sessions
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<()> {
        self.state().sessions.remove(id);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let mut state = self.state();
        let before = state.sessions.len();
        state.sessions.retain(|_, s| !s.is_expired());
        Ok(before - state.sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.into(),
            email: format!("{name}@example.com"),
            password: "!".into(),
        }
    }

    fn new_camp(author_id: i32) -> NewCampground {
        NewCampground {
            title: "Ridge Camp".into(),
            description: "Windy".into(),
            price: 25.0,
            location: "Denver, CO".into(),
            longitude: -104.99,
            latitude: 39.74,
            author_id,
        }
    }

    fn stored(name: &str) -> StoredImage {
        StoredImage {
            url: format!("/uploads/{name}"),
            filename: name.into(),
        }
    }

    #[tokio::test]
    async fn duplicate_users_conflict() {
        let store = MemoryStore::default();
        store.create_user(new_user("alice")).await.unwrap();
        let mut again = new_user("alice");
        again.email = "other@example.com".into();
        match store.create_user(again).await {
            Err(StoreError::Conflict(msg)) => assert_eq!(msg, USERNAME_TAKEN),
            other => panic!("Expected conflict, got {other:?}"),
        }
        let mut same_mail = new_user("bob");
        same_mail.email = "alice@example.com".into();
        match store.create_user(same_mail).await {
            Err(StoreError::Conflict(msg)) => assert_eq!(msg, EMAIL_TAKEN),
            other => panic!("Expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_cascades_to_reviews_only_of_that_campground() {
        let store = MemoryStore::default();
        let alice = store.create_user(new_user("alice")).await.unwrap();
        let a = store
            .create_campground(new_camp(alice.id), vec![stored("a.jpg")])
            .await
            .unwrap();
        let b = store
            .create_campground(new_camp(alice.id), vec![stored("b.jpg")])
            .await
            .unwrap();
        for campground_id in [a.id, a.id, b.id] {
            store
                .create_review(NewReview {
                    campground_id,
                    author_id: alice.id,
                    rating: 4,
                    body: "Good".into(),
                })
                .await
                .unwrap();
        }
        let gone = store.delete_campground(a.id).await.unwrap().unwrap();
        assert_eq!(gone.len(), 1);
        assert_eq!(gone[0].filename, "a.jpg");
        let left = store.all_reviews();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].campground_id, b.id);
        assert_eq!(store.images(b.id).await.unwrap().len(), 1);
        assert_eq!(store.delete_campground(a.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn remove_images_only_touches_own_campground() {
        let store = MemoryStore::default();
        let a = store
            .create_campground(new_camp(1), vec![stored("a.jpg")])
            .await
            .unwrap();
        let b = store
            .create_campground(new_camp(1), vec![stored("b.jpg")])
            .await
            .unwrap();
        let names = vec!["a.jpg".to_string(), "b.jpg".to_string()];
        assert_eq!(store.remove_images(a.id, &names).await.unwrap(), 1);
        assert!(store.images(a.id).await.unwrap().is_empty());
        assert_eq!(store.images(b.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn expired_sessions_are_not_loaded() {
        let store = MemoryStore::default();
        let live = Session::new(Duration::days(1));
        let dead = Session::new(Duration::seconds(-5));
        store.save(&live).await.unwrap();
        store.save(&dead).await.unwrap();
        assert_eq!(store.load(&live.id).await.unwrap(), Some(live.clone()));
        assert_eq!(store.load(&dead.id).await.unwrap(), None);
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert!(store.session(&dead.id).is_none());
    }
}
