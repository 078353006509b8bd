use super::{
    with_images, Repo, Result, SessionStore, StoreError, EMAIL_TAKEN,
    USERNAME_TAKEN,
};
use crate::dbopt::{PgPool, PooledPg};
use crate::models::{
    Campground, CampgroundChanges, CampgroundDetails, Image, NewCampground,
    NewImage, NewReview, NewUser, Review, Session, SessionData, StoredImage,
    User,
};
use crate::schema::campground_images::dsl as i;
use crate::schema::campgrounds::dsl as c;
use crate::schema::reviews::dsl as r;
use crate::schema::sessions::dsl as s;
use crate::schema::users::dsl as u;
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use tracing::{debug, warn};

/// Storage in a postgres database.
#[derive(Clone)]
pub struct PgRepo {
    pool: PgPool,
}

impl PgRepo {
    pub fn new(pool: PgPool) -> Self {
        PgRepo { pool }
    }
    async fn db(&self) -> Result<PooledPg> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))
    }
}

async fn insert_images(
    db: &mut AsyncPgConnection,
    campground_id: i32,
    images: &[StoredImage],
) -> Result<(), DieselError> {
    if images.is_empty() {
        return Ok(());
    }
    let rows = images
        .iter()
        .map(|img| NewImage {
            campground_id,
            url: &img.url,
            filename: &img.filename,
        })
        .collect::<Vec<_>>();
    diesel::insert_into(i::campground_images)
        .values(&rows)
        .execute(db)
        .await?;
    Ok(())
}

#[async_trait]
impl Repo for PgRepo {
    async fn campgrounds(&self) -> Result<Vec<(Campground, Vec<Image>)>> {
        let mut db = self.db().await?;
        let db: &mut AsyncPgConnection = &mut db;
        let campgrounds = c::campgrounds
            .order(c::id)
            .select(Campground::as_select())
            .load(db)
            .await?;
        let images = i::campground_images
            .order(i::id)
            .select(Image::as_select())
            .load(db)
            .await?;
        Ok(with_images(campgrounds, images))
    }

    async fn campground(&self, id: i32) -> Result<Option<Campground>> {
        let mut db = self.db().await?;
        Ok(c::campgrounds
            .find(id)
            .select(Campground::as_select())
            .first(&mut db)
            .await
            .optional()?)
    }

    async fn images(&self, campground: i32) -> Result<Vec<Image>> {
        let mut db = self.db().await?;
        Ok(i::campground_images
            .filter(i::campground_id.eq(campground))
            .order(i::id)
            .select(Image::as_select())
            .load(&mut db)
            .await?)
    }

    async fn campground_details(
        &self,
        id: i32,
    ) -> Result<Option<CampgroundDetails>> {
        let mut db = self.db().await?;
        let db: &mut AsyncPgConnection = &mut db;
        let Some(campground) = c::campgrounds
            .find(id)
            .select(Campground::as_select())
            .first(db)
            .await
            .optional()?
        else {
            return Ok(None);
        };
        let author = u::users
            .find(campground.author_id)
            .select(User::as_select())
            .first(db)
            .await?;
        let images = i::campground_images
            .filter(i::campground_id.eq(id))
            .order(i::id)
            .select(Image::as_select())
            .load(db)
            .await?;
        let reviews = r::reviews
            .inner_join(u::users)
            .filter(r::campground_id.eq(id))
            .order(r::id)
            .select((Review::as_select(), User::as_select()))
            .load::<(Review, User)>(db)
            .await?;
        Ok(Some(CampgroundDetails {
            campground,
            author,
            images,
            reviews,
        }))
    }

    async fn create_campground(
        &self,
        campground: NewCampground,
        images: Vec<StoredImage>,
    ) -> Result<Campground> {
        let mut db = self.db().await?;
        let db: &mut AsyncPgConnection = &mut db;
        db.transaction::<_, StoreError, _>(move |db| {
            async move {
                let campground = diesel::insert_into(c::campgrounds)
                    .values(&campground)
                    .returning(Campground::as_returning())
                    .get_result(db)
                    .await?;
                insert_images(db, campground.id, &images).await?;
                Ok(campground)
            }
            .scope_boxed()
        })
        .await
    }

    async fn update_campground(
        &self,
        id: i32,
        changes: CampgroundChanges,
        images: Vec<StoredImage>,
    ) -> Result<Option<Campground>> {
        let mut db = self.db().await?;
        let db: &mut AsyncPgConnection = &mut db;
        db.transaction::<_, StoreError, _>(move |db| {
            async move {
                let Some(campground) =
                    diesel::update(c::campgrounds.find(id))
                        .set(&changes)
                        .returning(Campground::as_returning())
                        .get_result(db)
                        .await
                        .optional()?
                else {
                    return Ok(None);
                };
                insert_images(db, id, &images).await?;
                Ok(Some(campground))
            }
            .scope_boxed()
        })
        .await
    }

    async fn remove_images(
        &self,
        campground: i32,
        filenames: &[String],
    ) -> Result<usize> {
        let mut db = self.db().await?;
        Ok(diesel::delete(
            i::campground_images
                .filter(i::campground_id.eq(campground))
                .filter(i::filename.eq_any(filenames)),
        )
        .execute(&mut db)
        .await?)
    }

    async fn delete_campground(&self, id: i32) -> Result<Option<Vec<Image>>> {
        let mut db = self.db().await?;
        let db: &mut AsyncPgConnection = &mut db;
        db.transaction::<_, StoreError, _>(move |db| {
            async move {
                let images = i::campground_images
                    .filter(i::campground_id.eq(id))
                    .order(i::id)
                    .select(Image::as_select())
                    .load(db)
                    .await?;
                let reviews =
                    diesel::delete(r::reviews.filter(r::campground_id.eq(id)))
                        .execute(db)
                        .await?;
                diesel::delete(
                    i::campground_images.filter(i::campground_id.eq(id)),
                )
                .execute(db)
                .await?;
                let n = diesel::delete(c::campgrounds.find(id))
                    .execute(db)
                    .await?;
                debug!("Deleted campground #{id} and {reviews} reviews");
                Ok((n > 0).then_some(images))
            }
            .scope_boxed()
        })
        .await
    }

    async fn clear_campgrounds(&self) -> Result<usize> {
        let mut db = self.db().await?;
        let db: &mut AsyncPgConnection = &mut db;
        db.transaction::<_, StoreError, _>(|db| {
            async move {
                diesel::delete(r::reviews).execute(db).await?;
                diesel::delete(i::campground_images).execute(db).await?;
                Ok(diesel::delete(c::campgrounds).execute(db).await?)
            }
            .scope_boxed()
        })
        .await
    }

    async fn review(&self, id: i32) -> Result<Option<Review>> {
        let mut db = self.db().await?;
        Ok(r::reviews
            .find(id)
            .select(Review::as_select())
            .first(&mut db)
            .await
            .optional()?)
    }

    async fn create_review(&self, review: NewReview) -> Result<Review> {
        let mut db = self.db().await?;
        Ok(diesel::insert_into(r::reviews)
            .values(&review)
            .returning(Review::as_returning())
            .get_result(&mut db)
            .await?)
    }

    async fn delete_review(
        &self,
        campground: i32,
        review: i32,
    ) -> Result<bool> {
        let mut db = self.db().await?;
        let n = diesel::delete(
            r::reviews
                .filter(r::id.eq(review))
                .filter(r::campground_id.eq(campground)),
        )
        .execute(&mut db)
        .await?;
        Ok(n > 0)
    }

    async fn user(&self, id: i32) -> Result<Option<User>> {
        let mut db = self.db().await?;
        Ok(u::users
            .find(id)
            .select(User::as_select())
            .first(&mut db)
            .await
            .optional()?)
    }

    async fn users(&self) -> Result<Vec<User>> {
        let mut db = self.db().await?;
        Ok(u::users
            .order(u::username)
            .select(User::as_select())
            .load(&mut db)
            .await?)
    }

    async fn user_with_password(
        &self,
        username: &str,
    ) -> Result<Option<(User, String)>> {
        let mut db = self.db().await?;
        Ok(u::users
            .filter(u::username.eq(username))
            .select((User::as_select(), u::password))
            .first::<(User, String)>(&mut db)
            .await
            .optional()?)
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut db = self.db().await?;
        diesel::insert_into(u::users)
            .values(&user)
            .returning(User::as_returning())
            .get_result(&mut db)
            .await
            .map_err(|e| match e {
                DieselError::DatabaseError(
                    DatabaseErrorKind::UniqueViolation,
                    ref info,
                ) => {
                    let msg = match info.constraint_name() {
                        Some(name) if name.contains("email") => EMAIL_TAKEN,
                        _ => USERNAME_TAKEN,
                    };
                    StoreError::Conflict(msg.into())
                }
                e => e.into(),
            })
    }

    async fn set_password(&self, username: &str, hash: &str) -> Result<bool> {
        let mut db = self.db().await?;
        let n = diesel::update(u::users.filter(u::username.eq(username)))
            .set(u::password.eq(hash))
            .execute(&mut db)
            .await?;
        Ok(n > 0)
    }
}

#[async_trait]
impl SessionStore for PgRepo {
    async fn load(&self, id: &str) -> Result<Option<Session>> {
        let mut db = self.db().await?;
        let now = Utc::now().naive_utc();
        let row = s::sessions
            .find(id)
            .filter(s::expires_at.gt(now))
            .select((s::id, s::user_id, s::data, s::expires_at))
            .first::<(String, Option<i32>, String, NaiveDateTime)>(&mut db)
            .await
            .optional()?;
        Ok(row.map(|(id, user_id, data, expires_at)| {
            let data = serde_json::from_str::<SessionData>(&data)
                .unwrap_or_else(|e| {
                    warn!("Dropping bad data in session: {e}");
                    SessionData::default()
                });
            Session {
                id,
                user_id,
                data,
                expires_at,
            }
        }))
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let data = serde_json::to_string(&session.data)?;
        let mut db = self.db().await?;
        diesel::insert_into(s::sessions)
            .values((
                s::id.eq(&session.id),
                s::user_id.eq(session.user_id),
                s::data.eq(&data),
                s::expires_at.eq(session.expires_at),
            ))
            .on_conflict(s::id)
            .do_update()
            .set((
                s::user_id.eq(session.user_id),
                s::data.eq(&data),
                s::expires_at.eq(session.expires_at),
            ))
            .execute(&mut db)
            .await?;
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<()> {
        let mut db = self.db().await?;
        diesel::delete(s::sessions.find(id)).execute(&mut db).await?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let mut db = self.db().await?;
        let now = Utc::now().naive_utc();
        Ok(diesel::delete(s::sessions.filter(s::expires_at.le(now)))
            .execute(&mut db)
            .await?)
    }
}
