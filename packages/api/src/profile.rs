//! # Profile lifecycle
//!
//! A profile goes through three states, derived from the stored row:
//!
//! ```text
//! Absent ──begin──▶ Pending ──complete──▶ Completed
//!    └──────────────complete──────────────────┘
//! ```
//!
//! - [`ProfileState::begin`] runs on first sign-up / first OAuth login and
//!   creates the pending row (name and avatar pre-filled from the provider).
//! - [`ProfileState::complete`] runs when the onboarding form or the profile
//!   page is submitted and sets `is_profile_completed`.
//!
//! Only a `Completed` profile lets the user past the [`crate::gate`].
//! Profiles are never deleted here.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use store::{Account, Profile, ProfileStore};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::notice::Notice;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileState {
    Absent,
    Pending(Profile),
    Completed(Profile),
}

/// Validated field values ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDetails {
    pub name: String,
    pub phone_number: String,
    pub school: Option<String>,
    pub department: Option<String>,
    pub student_id: Option<String>,
}

impl ProfileState {
    pub fn from_row(row: Option<Profile>) -> Self {
        match row {
            None => Self::Absent,
            Some(profile) if profile.is_profile_completed => Self::Completed(profile),
            Some(profile) => Self::Pending(profile),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn into_profile(self) -> Option<Profile> {
        match self {
            Self::Absent => None,
            Self::Pending(profile) | Self::Completed(profile) => Some(profile),
        }
    }

    /// The pending row to create, or `None` if a row already exists.
    pub fn begin(
        &self,
        user_id: Uuid,
        name: Option<String>,
        avatar_url: Option<String>,
        now: DateTime<Utc>,
    ) -> Option<Profile> {
        match self {
            Self::Absent => Some(Profile {
                name,
                avatar_url,
                ..Profile::empty(user_id, now)
            }),
            Self::Pending(_) | Self::Completed(_) => None,
        }
    }

    /// Apply `details` and mark the profile completed. Fields not present in
    /// `details` keep their stored values.
    pub fn complete(self, user_id: Uuid, details: ProfileDetails, now: DateTime<Utc>) -> Profile {
        let base = self
            .into_profile()
            .unwrap_or_else(|| Profile::empty(user_id, now));

        Profile {
            name: Some(details.name),
            phone_number: Some(details.phone_number),
            school: details.school.or(base.school),
            department: details.department.or(base.department),
            student_id: details.student_id.or(base.student_id),
            is_profile_completed: true,
            updated_at: now,
            ..base
        }
    }
}

/// A phone number is acceptable when it has 10 or 11 digits, ignoring
/// separators such as `-` and spaces.
pub fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    (10..=11).contains(&digits)
}

fn required(value: &str, message: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(message));
    }
    Ok(value.to_string())
}

/// The `/signup` form shown until onboarding is done.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OnboardingForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone_number: String,
}

impl OnboardingForm {
    pub fn validate(&self) -> AppResult<ProfileDetails> {
        let name = required(&self.name, "Please enter your name.")?;
        let phone_number = required(&self.phone_number, "Please enter your phone number.")?;
        if !is_valid_phone(&phone_number) {
            return Err(AppError::validation("Please enter a valid phone number."));
        }

        Ok(ProfileDetails {
            name,
            phone_number,
            school: None,
            department: None,
            student_id: None,
        })
    }
}

/// The `/profile` edit form. Every field is required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub school: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub student_id: String,
}

impl ProfileForm {
    pub fn validate(&self) -> AppResult<ProfileDetails> {
        Ok(ProfileDetails {
            name: required(&self.name, "Please enter your name.")?,
            phone_number: required(&self.phone_number, "Please enter your phone number.")?,
            school: Some(required(&self.school, "Please enter your school.")?),
            department: Some(required(&self.department, "Please enter your department.")?),
            student_id: Some(required(&self.student_id, "Please enter your student ID.")?),
        })
    }
}

/// Create the pending profile for a newly signed-up account.
pub async fn begin_onboarding<S: ProfileStore>(store: &S, account: &Account) -> AppResult<()> {
    let state = ProfileState::from_row(store.get_profile(account.id).await?);
    if let Some(profile) = state.begin(
        account.id,
        account.name.clone(),
        account.avatar_url.clone(),
        Utc::now(),
    ) {
        store.upsert_profile(profile).await?;
        info!("Created pending profile for {}", account.id);
    }
    Ok(())
}

async fn write_details<S: ProfileStore>(
    store: &S,
    session: &Session,
    details: ProfileDetails,
) -> AppResult<Profile> {
    let result = async {
        let state = ProfileState::from_row(store.get_profile(session.user_id).await?);
        let profile = state.complete(session.user_id, details, Utc::now());
        Ok(store.upsert_profile(profile).await?)
    }
    .await;

    if let Err(e) = &result {
        error!("Profile update failed for {}: {}", session.user_id, e);
    }
    result
}

/// Submit the onboarding form.
pub async fn complete_onboarding<S: ProfileStore>(
    store: &S,
    session: &Session,
    form: &OnboardingForm,
) -> AppResult<(Profile, Notice)> {
    let details = form.validate()?;
    let profile = write_details(store, session, details).await?;
    Ok((
        profile,
        Notice::success(
            "Sign-up complete",
            "Welcome! You can start using the service now.",
        ),
    ))
}

/// Submit the profile edit form.
pub async fn save_profile<S: ProfileStore>(
    store: &S,
    session: &Session,
    form: &ProfileForm,
) -> AppResult<(Profile, Notice)> {
    let details = form.validate()?;
    let profile = write_details(store, session, details).await?;
    Ok((
        profile,
        Notice::success("Profile updated", "Your profile was updated successfully."),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::MemoryStore;

    fn session_for(account: &Account) -> Session {
        Session::from_account(account)
    }

    #[test]
    fn test_state_from_row() {
        let id = Uuid::new_v4();
        assert_eq!(ProfileState::from_row(None), ProfileState::Absent);

        let pending = Profile::empty(id, Utc::now());
        assert!(matches!(
            ProfileState::from_row(Some(pending.clone())),
            ProfileState::Pending(_)
        ));

        let done = Profile {
            is_profile_completed: true,
            ..pending
        };
        assert!(ProfileState::from_row(Some(done)).is_completed());
    }

    #[test]
    fn test_begin_only_from_absent() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let created = ProfileState::Absent
            .begin(id, Some("nick".to_string()), None, now)
            .unwrap();
        assert!(!created.is_profile_completed);
        assert_eq!(created.name.as_deref(), Some("nick"));

        assert!(ProfileState::Pending(created.clone())
            .begin(id, None, None, now)
            .is_none());
    }

    #[test]
    fn test_complete_keeps_unrelated_fields() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let existing = Profile {
            school: Some("KAIST".to_string()),
            ..Profile::empty(id, now)
        };

        let details = OnboardingForm {
            name: " 홍길동 ".to_string(),
            phone_number: "010-1234-5678".to_string(),
        }
        .validate()
        .unwrap();

        let done = ProfileState::Pending(existing).complete(id, details, now);
        assert!(done.is_profile_completed);
        assert_eq!(done.name.as_deref(), Some("홍길동"));
        assert_eq!(done.school.as_deref(), Some("KAIST"));
    }

    #[test]
    fn test_phone_validation() {
        assert!(is_valid_phone("010-1234-5678"));
        assert!(is_valid_phone("0212345678"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("010-1234-56789"));
    }

    #[test]
    fn test_onboarding_form_rejects_missing_fields() {
        let form = OnboardingForm {
            name: "  ".to_string(),
            phone_number: "01012345678".to_string(),
        };
        assert!(matches!(form.validate(), Err(AppError::Validation(_))));

        let form = OnboardingForm {
            name: "홍길동".to_string(),
            phone_number: "call me".to_string(),
        };
        assert!(matches!(form.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_profile_form_requires_every_field() {
        let mut form = ProfileForm {
            name: "홍길동".to_string(),
            phone_number: "01012345678".to_string(),
            school: "KAIST".to_string(),
            department: "CS".to_string(),
            student_id: "20240001".to_string(),
        };
        assert!(form.validate().is_ok());

        form.department.clear();
        let err = form.validate().unwrap_err();
        assert_eq!(err.to_string(), "Please enter your department.");
    }

    #[tokio::test]
    async fn test_onboarding_completes_stored_profile() {
        let store = MemoryStore::new();
        let account = Account::new("kakao", "7");
        begin_onboarding(&store, &account).await.unwrap();
        assert!(!store
            .get_profile(account.id)
            .await
            .unwrap()
            .unwrap()
            .is_profile_completed);

        let (profile, notice) = complete_onboarding(
            &store,
            &session_for(&account),
            &OnboardingForm {
                name: "홍길동".to_string(),
                phone_number: "01012345678".to_string(),
            },
        )
        .await
        .unwrap();
        assert!(profile.is_profile_completed);
        assert!(!notice.is_error());
        assert!(store
            .get_profile(account.id)
            .await
            .unwrap()
            .unwrap()
            .is_profile_completed);
    }

    #[tokio::test]
    async fn test_invalid_form_writes_nothing() {
        let store = MemoryStore::new();
        let account = Account::new("kakao", "8");

        let result = save_profile(&store, &session_for(&account), &ProfileForm::default()).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(store.get_profile(account.id).await.unwrap().is_none());
    }
}
