// Repository pattern - isolates all profile database side effects
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;

use crate::db::{is_unique_violation, now_timestamp, RepositoryError};
use crate::ids::{ProfileId, UserId};
use crate::profiles::domain::{Gender, NewProfile, Profile, ProfileImage};
use crate::state::DbPool;

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get(&self, id: &ProfileId) -> Result<Option<Profile>, RepositoryError>;

    async fn get_by_user(&self, user_id: &UserId) -> Result<Option<Profile>, RepositoryError>;

    /// Insert profile and images together. `Conflict` if the user already
    /// has a profile.
    async fn create(&self, profile: &NewProfile) -> Result<Profile, RepositoryError>;

    /// Overwrite the mutable columns of an existing profile.
    async fn update(&self, profile: &Profile) -> Result<Profile, RepositoryError>;

    /// Delete the user's profile; everything hanging off it cascades.
    async fn delete_by_user(&self, user_id: &UserId) -> Result<bool, RepositoryError>;

    /// Returns true when a new bookmark was created.
    async fn bookmark(
        &self,
        user_id: &UserId,
        profile_id: &ProfileId,
    ) -> Result<bool, RepositoryError>;

    async fn list_bookmarks(&self, user_id: &UserId) -> Result<Vec<Profile>, RepositoryError>;

    /// Every profile with its images, newest first.
    async fn list(&self) -> Result<Vec<Profile>, RepositoryError>;
}

pub type DynProfileRepository = Arc<dyn ProfileRepository>;

pub struct SqliteProfileRepository {
    pool: DbPool,
}

impl SqliteProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const PROFILE_COLUMNS: &str = "p.id, p.user_id, u.full_name, p.short_bio, p.age, p.gender, p.height,
     p.country, p.city, p.religion, p.birthday, p.education, p.profession, p.income,
     p.created_at, p.updated_at
     FROM profiles p JOIN users u ON u.id = p.user_id";

fn profile_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    let gender: String = row.get(5)?;
    let gender = Gender::parse(&gender).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(5, "gender".into(), rusqlite::types::Type::Text)
    })?;
    let birthday: Option<String> = row.get(10)?;

    Ok(Profile {
        id: ProfileId::new(row.get::<_, String>(0)?),
        user_id: UserId::new(row.get::<_, String>(1)?),
        full_name: row.get(2)?,
        short_bio: row.get(3)?,
        age: row.get::<_, i64>(4)? as u32,
        gender,
        height: row.get(6)?,
        country: row.get(7)?,
        city: row.get(8)?,
        religion: row.get(9)?,
        birthday: birthday.and_then(|b| NaiveDate::parse_from_str(&b, "%Y-%m-%d").ok()),
        education: row.get(11)?,
        profession: row.get(12)?,
        income: row.get::<_, i64>(13)? as u64,
        images: Vec::new(),
        display_image: None,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

fn load_images(conn: &Connection, profile_id: &ProfileId) -> rusqlite::Result<Vec<ProfileImage>> {
    let mut stmt = conn.prepare(
        "SELECT url, position FROM profile_images WHERE profile_id = ?1 ORDER BY position",
    )?;
    let images = stmt
        .query_map(params![profile_id.as_str()], |row| {
            Ok(ProfileImage {
                url: row.get(0)?,
                position: row.get::<_, i64>(1)? as u32,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(images)
}

/// Load one profile (with images) by id using the given connection.
pub(crate) fn load_profile(
    conn: &Connection,
    id: &ProfileId,
) -> rusqlite::Result<Option<Profile>> {
    let sql = format!("SELECT {} WHERE p.id = ?1", PROFILE_COLUMNS);
    let profile = conn
        .query_row(&sql, params![id.as_str()], profile_from_row)
        .optional()?;

    match profile {
        Some(mut profile) => {
            profile.set_images(load_images(conn, &profile.id)?);
            Ok(Some(profile))
        }
        None => Ok(None),
    }
}

/// Existence check used inside other repositories' transactions.
pub(crate) fn profile_exists(conn: &Connection, id: &ProfileId) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM profiles WHERE id = ?1",
        params![id.as_str()],
        |row| row.get(0),
    )
}

#[async_trait]
impl ProfileRepository for SqliteProfileRepository {
    async fn get(&self, id: &ProfileId) -> Result<Option<Profile>, RepositoryError> {
        let conn = self.pool.get()?;
        Ok(load_profile(&conn, id)?)
    }

    async fn get_by_user(&self, user_id: &UserId) -> Result<Option<Profile>, RepositoryError> {
        let conn = self.pool.get()?;

        let id: Option<String> = conn
            .query_row(
                "SELECT id FROM profiles WHERE user_id = ?1",
                params![user_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        match id {
            Some(id) => Ok(load_profile(&conn, &ProfileId::new(id))?),
            None => Ok(None),
        }
    }

    async fn create(&self, profile: &NewProfile) -> Result<Profile, RepositoryError> {
        let mut conn = self.pool.get()?;
        let now = now_timestamp();

        let tx = conn.transaction()?;
        let inserted = tx.execute(
            "INSERT INTO profiles (id, user_id, short_bio, age, gender, height, country, city,
                                   religion, birthday, education, profession, income,
                                   created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
            params![
                profile.id.as_str(),
                profile.user_id.as_str(),
                profile.short_bio,
                profile.age as i64,
                profile.gender.as_str(),
                profile.height,
                profile.country,
                profile.city,
                profile.religion,
                profile.birthday.map(|b| b.format("%Y-%m-%d").to_string()),
                profile.education,
                profile.profession,
                profile.income as i64,
                now,
            ],
        );

        if let Err(e) = inserted {
            return Err(if is_unique_violation(&e) {
                RepositoryError::Conflict(format!(
                    "user {} already has a profile",
                    profile.user_id
                ))
            } else {
                e.into()
            });
        }

        for (position, image) in profile.images.iter().enumerate() {
            tx.execute(
                "INSERT INTO profile_images (id, profile_id, file_name, url, position)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    uuid::Uuid::now_v7().to_string(),
                    profile.id.as_str(),
                    image.file_name,
                    image.url,
                    position as i64,
                ],
            )?;
        }

        let created = load_profile(&tx, &profile.id)?
            .ok_or_else(|| RepositoryError::NotFound(profile.id.to_string()))?;
        tx.commit()?;

        Ok(created)
    }

    async fn update(&self, profile: &Profile) -> Result<Profile, RepositoryError> {
        let conn = self.pool.get()?;

        let rows = conn.execute(
            "UPDATE profiles SET short_bio = ?2, age = ?3, gender = ?4, height = ?5,
                    country = ?6, city = ?7, religion = ?8, birthday = ?9, education = ?10,
                    profession = ?11, income = ?12, updated_at = ?13
             WHERE id = ?1",
            params![
                profile.id.as_str(),
                profile.short_bio,
                profile.age as i64,
                profile.gender.as_str(),
                profile.height,
                profile.country,
                profile.city,
                profile.religion,
                profile.birthday.map(|b| b.format("%Y-%m-%d").to_string()),
                profile.education,
                profile.profession,
                profile.income as i64,
                now_timestamp(),
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound(profile.id.to_string()));
        }

        load_profile(&conn, &profile.id)?
            .ok_or_else(|| RepositoryError::NotFound(profile.id.to_string()))
    }

    async fn delete_by_user(&self, user_id: &UserId) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM profiles WHERE user_id = ?1",
            params![user_id.as_str()],
        )?;
        Ok(rows > 0)
    }

    async fn bookmark(
        &self,
        user_id: &UserId,
        profile_id: &ProfileId,
    ) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;

        if !profile_exists(&conn, profile_id)? {
            return Err(RepositoryError::NotFound(profile_id.to_string()));
        }

        let rows = conn.execute(
            "INSERT INTO bookmarks (id, user_id, profile_id, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, profile_id) DO NOTHING",
            params![
                uuid::Uuid::now_v7().to_string(),
                user_id.as_str(),
                profile_id.as_str(),
                now_timestamp(),
            ],
        )?;

        Ok(rows > 0)
    }

    async fn list_bookmarks(&self, user_id: &UserId) -> Result<Vec<Profile>, RepositoryError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(
            "SELECT profile_id FROM bookmarks WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC",
        )?;
        let ids: Vec<String> = stmt
            .query_map(params![user_id.as_str()], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut profiles = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(profile) = load_profile(&conn, &ProfileId::new(id))? {
                profiles.push(profile);
            }
        }
        Ok(profiles)
    }

    async fn list(&self) -> Result<Vec<Profile>, RepositoryError> {
        let conn = self.pool.get()?;

        let sql = format!("SELECT {} ORDER BY p.created_at DESC, p.id DESC", PROFILE_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let mut profiles = stmt
            .query_map([], profile_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        for profile in &mut profiles {
            let images = load_images(&conn, &profile.id)?;
            profile.set_images(images);
        }
        Ok(profiles)
    }
}
