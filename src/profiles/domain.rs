// Profile domain types and validation - pure, no I/O
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::attachments::{AttachmentError, AttachmentPayload, StoredAttachment};
use crate::ids::{ProfileId, UserId};

pub const MAX_PROFILE_IMAGES: usize = 6;
pub const MIN_BIO_CHARS: usize = 10;
pub const MIN_AGE: u32 = 18;
pub const MAX_AGE: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "male" => Some(Self::Male),
            "female" => Some(Self::Female),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileImage {
    pub url: String,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub user_id: UserId,
    pub full_name: Option<String>,
    pub short_bio: String,
    pub age: u32,
    pub gender: Gender,
    pub height: String,
    pub country: Option<String>,
    pub city: String,
    pub religion: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub education: Option<String>,
    pub profession: String,
    pub income: u64,
    /// Ordered by position.
    pub images: Vec<ProfileImage>,
    /// URL of the first image.
    #[serde(default)]
    pub display_image: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Profile {
    /// Replace the image list, keeping `display_image` on the first one.
    pub fn set_images(&mut self, images: Vec<ProfileImage>) {
        self.display_image = images.first().map(|i| i.url.clone());
        self.images = images;
    }
}

/// Which fields a write may touch. `Create` requires the mandatory fields
/// and accepts images; `Patch` validates only what is present and leaves
/// images alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    Patch,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileInput {
    pub short_bio: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<Gender>,
    pub height: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub religion: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub education: Option<String>,
    pub profession: Option<String>,
    pub income: Option<i64>,
    pub images: Option<Vec<AttachmentPayload>>,
}

/// Everything needed to insert a profile, already validated.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub id: ProfileId,
    pub user_id: UserId,
    pub short_bio: String,
    pub age: u32,
    pub gender: Gender,
    pub height: String,
    pub country: Option<String>,
    pub city: String,
    pub religion: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub education: Option<String>,
    pub profession: String,
    pub income: u64,
    pub images: Vec<StoredAttachment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileError {
    NotFound,
    DuplicateProfile,
    Validation(String),
    Attachment(AttachmentError),
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "Profile does not exist"),
            Self::DuplicateProfile => write!(f, "This user already has a profile"),
            Self::Validation(msg) => write!(f, "{}", msg),
            Self::Attachment(e) => write!(f, "Invalid image: {}", e),
        }
    }
}

impl std::error::Error for ProfileError {}

impl From<AttachmentError> for ProfileError {
    fn from(err: AttachmentError) -> Self {
        Self::Attachment(err)
    }
}

fn invalid(msg: impl Into<String>) -> ProfileError {
    ProfileError::Validation(msg.into())
}

impl ProfileInput {
    pub fn validate(&self, mode: Mode) -> Result<(), ProfileError> {
        if mode == Mode::Create {
            if self.short_bio.is_none() {
                return Err(invalid("short_bio is required"));
            }
            if self.age.is_none() {
                return Err(invalid("age is required"));
            }
            if self.gender.is_none() {
                return Err(invalid("gender is required"));
            }
            if self.city.as_deref().map(str::trim).unwrap_or("").is_empty() {
                return Err(invalid("city is required"));
            }
        }

        if mode == Mode::Patch && self.images.is_some() {
            return Err(invalid("images cannot be changed by a patch"));
        }

        if let Some(bio) = &self.short_bio {
            if bio.trim().chars().count() < MIN_BIO_CHARS {
                return Err(invalid(format!(
                    "Short bio should have at least {} characters",
                    MIN_BIO_CHARS
                )));
            }
        }

        if let Some(age) = self.age {
            if age < MIN_AGE as i64 || age > MAX_AGE as i64 {
                return Err(invalid(format!(
                    "Age must be between {} and {}",
                    MIN_AGE, MAX_AGE
                )));
            }
        }

        if let Some(city) = &self.city {
            if city.trim().is_empty() {
                return Err(invalid("city cannot be empty"));
            }
        }

        if let Some(income) = self.income {
            if income < 0 {
                return Err(invalid("Income should be a positive value"));
            }
        }

        if let Some(images) = &self.images {
            if images.len() > MAX_PROFILE_IMAGES {
                return Err(invalid(format!(
                    "The maximum number of allowed images is {}",
                    MAX_PROFILE_IMAGES
                )));
            }
        }

        Ok(())
    }

    /// Build the insert record. Call `validate(Mode::Create)` first.
    pub fn into_new_profile(
        self,
        user_id: UserId,
        images: Vec<StoredAttachment>,
    ) -> Result<NewProfile, ProfileError> {
        self.validate(Mode::Create)?;
        Ok(NewProfile {
            id: ProfileId::generate(),
            user_id,
            short_bio: self.short_bio.unwrap_or_default().trim().to_string(),
            age: self.age.unwrap_or_default() as u32,
            gender: self.gender.ok_or_else(|| invalid("gender is required"))?,
            height: self.height.unwrap_or_default(),
            country: self.country,
            city: self.city.unwrap_or_default().trim().to_string(),
            religion: self.religion,
            birthday: self.birthday,
            education: self.education,
            profession: self.profession.unwrap_or_default(),
            income: self.income.unwrap_or_default() as u64,
            images,
        })
    }

    /// Apply a validated patch on top of an existing profile.
    pub fn apply_to(&self, profile: &mut Profile) -> Result<(), ProfileError> {
        self.validate(Mode::Patch)?;
        if let Some(bio) = &self.short_bio {
            profile.short_bio = bio.trim().to_string();
        }
        if let Some(age) = self.age {
            profile.age = age as u32;
        }
        if let Some(gender) = self.gender {
            profile.gender = gender;
        }
        if let Some(height) = &self.height {
            profile.height = height.clone();
        }
        if self.country.is_some() {
            profile.country = self.country.clone();
        }
        if let Some(city) = &self.city {
            profile.city = city.trim().to_string();
        }
        if self.religion.is_some() {
            profile.religion = self.religion.clone();
        }
        if self.birthday.is_some() {
            profile.birthday = self.birthday;
        }
        if self.education.is_some() {
            profile.education = self.education.clone();
        }
        if let Some(profession) = &self.profession {
            profile.profession = profession.clone();
        }
        if let Some(income) = self.income {
            profile.income = income as u64;
        }
        Ok(())
    }
}
