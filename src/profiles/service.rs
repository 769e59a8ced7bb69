use crate::attachments::{discard, DynAttachmentStore};
use crate::db::RepositoryError;
use crate::error::{AppError, AppResult};
use crate::ids::{ProfileId, UserId};
use crate::profiles::domain::{Mode, Profile, ProfileError, ProfileInput};
use crate::profiles::repository::DynProfileRepository;

/// Whether a bookmark call created a row or found an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookmarkOutcome {
    Created,
    AlreadyBookmarked,
}

#[derive(Clone)]
pub struct ProfileService {
    repo: DynProfileRepository,
    attachments: DynAttachmentStore,
    max_image_bytes: usize,
}

/// Repository errors seen through the profile lens: a missing row is a
/// missing profile and a conflict is a second profile for the same user.
fn profile_error(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound(_) => ProfileError::NotFound.into(),
        RepositoryError::Conflict(_) => ProfileError::DuplicateProfile.into(),
        other => other.into(),
    }
}

impl ProfileService {
    pub fn new(
        repo: DynProfileRepository,
        attachments: DynAttachmentStore,
        max_image_bytes: usize,
    ) -> Self {
        Self {
            repo,
            attachments,
            max_image_bytes,
        }
    }

    pub async fn get(&self, id: &ProfileId) -> AppResult<Profile> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| ProfileError::NotFound.into())
    }

    pub async fn get_by_user(&self, user_id: &UserId) -> AppResult<Profile> {
        self.repo
            .get_by_user(user_id)
            .await?
            .ok_or_else(|| ProfileError::NotFound.into())
    }

    /// One profile per user. Images are decoded and stored in order before
    /// the rows are written.
    pub async fn create(
        &self,
        user_id: &UserId,
        mut input: ProfileInput,
    ) -> AppResult<Profile> {
        input.validate(Mode::Create)?;

        if self.repo.get_by_user(user_id).await?.is_some() {
            return Err(ProfileError::DuplicateProfile.into());
        }

        let payloads = input.images.take().unwrap_or_default();
        let decoded = payloads
            .iter()
            .map(|p| p.decode(self.max_image_bytes))
            .collect::<Result<Vec<_>, _>>()
            .map_err(ProfileError::from)?;

        let mut stored = Vec::with_capacity(decoded.len());
        for image in decoded {
            stored.push(
                self.attachments
                    .put(image)
                    .await
                    .map_err(ProfileError::from)?,
            );
        }

        let new_profile = match input.into_new_profile(user_id.clone(), stored.clone()) {
            Ok(new_profile) => new_profile,
            Err(e) => {
                discard(&self.attachments, &stored).await;
                return Err(e.into());
            }
        };
        let profile = match self.repo.create(&new_profile).await {
            Ok(profile) => profile,
            Err(e) => {
                discard(&self.attachments, &stored).await;
                return Err(profile_error(e));
            }
        };

        tracing::info!("Created profile {} for user {}", profile.id, user_id);
        Ok(profile)
    }

    pub async fn update(
        &self,
        user_id: &UserId,
        patch: ProfileInput,
    ) -> AppResult<Profile> {
        let mut profile = self.get_by_user(user_id).await?;
        patch.apply_to(&mut profile)?;
        self.repo.update(&profile).await.map_err(profile_error)
    }

    pub async fn delete(&self, user_id: &UserId) -> AppResult<()> {
        if !self.repo.delete_by_user(user_id).await? {
            return Err(ProfileError::NotFound.into());
        }
        tracing::info!("Deleted profile of user {}", user_id);
        Ok(())
    }

    pub async fn bookmark(
        &self,
        user_id: &UserId,
        profile_id: &ProfileId,
    ) -> AppResult<BookmarkOutcome> {
        let created = self
            .repo
            .bookmark(user_id, profile_id)
            .await
            .map_err(profile_error)?;
        Ok(if created {
            BookmarkOutcome::Created
        } else {
            BookmarkOutcome::AlreadyBookmarked
        })
    }

    pub async fn bookmarks(&self, user_id: &UserId) -> AppResult<Vec<Profile>> {
        Ok(self.repo.list_bookmarks(user_id).await?)
    }

    pub async fn list(&self) -> AppResult<Vec<Profile>> {
        Ok(self.repo.list().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::{AttachmentPayload, LocalAttachmentStore};
    use crate::db::test_support::{insert_user, migrated_pool};
    use crate::profiles::domain::Gender;
    use crate::profiles::repository::SqliteProfileRepository;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn service() -> (ProfileService, TempDir) {
        let (pool, temp) = migrated_pool();
        insert_user(&pool, "u1");
        let store = LocalAttachmentStore::new(temp.path().join("uploads"));
        (
            ProfileService::new(
                Arc::new(SqliteProfileRepository::new(pool)),
                Arc::new(store),
                1024,
            ),
            temp,
        )
    }

    fn input() -> ProfileInput {
        ProfileInput {
            short_bio: Some("Engineer who enjoys reading".into()),
            age: Some(27),
            gender: Some(Gender::Female),
            city: Some("Rajshahi".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_stores_images_in_order() {
        let (service, temp) = service();
        let images = ["first", "second"]
            .iter()
            .map(|s| AttachmentPayload {
                data: STANDARD.encode(s.as_bytes()),
                format: "jpg".into(),
            })
            .collect();

        let profile = service
            .create(
                &UserId::new("u1"),
                ProfileInput {
                    images: Some(images),
                    ..input()
                },
            )
            .await
            .unwrap();

        assert_eq!(profile.images.len(), 2);
        let first = profile.display_image.clone().unwrap();
        let file = first.trim_start_matches("/media/");
        let bytes = std::fs::read(temp.path().join("uploads").join(file)).unwrap();
        assert_eq!(bytes, b"first");
    }

    #[tokio::test]
    async fn second_create_is_rejected() {
        let (service, _temp) = service();
        let user = UserId::new("u1");
        service.create(&user, input()).await.unwrap();

        let err = service.create(&user, input()).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateProfile));
    }

    #[tokio::test]
    async fn bad_image_fails_before_anything_is_written() {
        let (service, _temp) = service();
        let user = UserId::new("u1");
        let err = service
            .create(
                &user,
                ProfileInput {
                    images: Some(vec![AttachmentPayload {
                        data: "%%%".into(),
                        format: "png".into(),
                    }]),
                    ..input()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(matches!(
            service.get_by_user(&user).await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn bookmark_outcomes() {
        let (service, _temp) = service();
        let user = UserId::new("u1");
        let profile = service.create(&user, input()).await.unwrap();

        assert_eq!(
            service.bookmark(&user, &profile.id).await.unwrap(),
            BookmarkOutcome::Created
        );
        assert_eq!(
            service.bookmark(&user, &profile.id).await.unwrap(),
            BookmarkOutcome::AlreadyBookmarked
        );
        assert_eq!(service.bookmarks(&user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_insert_removes_stored_images() {
        let (service, temp) = service();
        // No users row, so the profile insert violates its foreign key
        let err = service
            .create(
                &UserId::new("ghost"),
                ProfileInput {
                    images: Some(vec![AttachmentPayload {
                        data: STANDARD.encode(b"face"),
                        format: "png".into(),
                    }]),
                    ..input()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Database(_)));

        let left = std::fs::read_dir(temp.path().join("uploads"))
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(left, 0);
        assert!(service.list().await.unwrap().is_empty());
    }
}
