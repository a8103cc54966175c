use std::path::Path;
use tracing::{error, info};

use crate::backend::{AuthApi, BlobStore, DataApi};
use crate::error::{ClientError, ClientResult, Result};
use crate::models::{NewProfile, Profile, ProfileUpdate, parse_skills};
use crate::services::storage::{image_content_type, image_object_name};
use crate::session::Session;
use crate::utils::validation::{validate_email, validate_full_name};

/// An image picked for upload.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("image")
            .to_string();
        Ok(Self { file_name, bytes })
    }
}

async fn upload_image<S: BlobStore>(store: &S, session: &Session, image: ImageUpload) -> Result<String> {
    let object_name = image_object_name(session.user_id(), &image.file_name);
    let url = store
        .upload(session, &object_name, image.bytes, image_content_type(&image.file_name))
        .await?;
    info!("Uploaded profile image {}", object_name);
    Ok(url)
}

fn optional_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// First-run form creating the profile row after sign-up.
#[derive(Debug, Clone, Default)]
pub struct ProfileSetup {
    pub bio: String,
    /// Comma-separated
    pub skills: String,
    pub image: Option<ImageUpload>,
}

impl ProfileSetup {
    /// Uploads the image if one was picked, then inserts the profile. The
    /// display name is the one given at sign-up.
    pub async fn submit<D: DataApi, S: BlobStore>(
        self,
        api: &D,
        store: &S,
        session: &Session,
    ) -> ClientResult<Profile> {
        let full_name = session
            .account
            .full_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| {
                session
                    .account
                    .email
                    .split('@')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            });

        let profile_image_url = match self.image {
            Some(image) => Some(upload_image(store, session, image).await?),
            None => None,
        };

        let profile = api
            .insert_profile(&NewProfile {
                user_id: session.user_id(),
                full_name,
                bio: optional_text(&self.bio),
                skills: parse_skills(&self.skills),
                profile_image_url,
            })
            .await?;

        info!("Created profile for {}", session.user_id());
        Ok(profile)
    }
}

/// Editable copy of the signed-in account's profile.
#[derive(Debug, Clone)]
pub struct ProfileForm {
    pub full_name: String,
    pub email: String,
    pub bio: String,
    /// Comma-separated
    pub skills: String,
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub profile: Profile,
    /// A confirmation mail went to the new address; the change applies once confirmed
    pub email_change_requested: bool,
}

/// The signed-in account's own profile.
pub struct OwnProfileView<'a, D> {
    api: &'a D,
    session: &'a Session,
    profile: Option<Profile>,
}

impl<'a, D: DataApi> OwnProfileView<'a, D> {
    pub async fn load(api: &'a D, session: &'a Session) -> Self {
        let profile = match api.get_profile(session.user_id()).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                error!("Error fetching profile: {}", e);
                None
            }
        };
        Self {
            api,
            session,
            profile,
        }
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn email(&self) -> &str {
        &self.session.account.email
    }

    /// Form pre-filled from the loaded profile.
    pub fn form(&self) -> Option<ProfileForm> {
        self.profile.as_ref().map(|profile| ProfileForm {
            full_name: profile.full_name.clone(),
            email: self.session.account.email.clone(),
            bio: profile.bio.clone().unwrap_or_default(),
            skills: profile.skills.join(", "),
            image: None,
        })
    }

    /// Uploads a new image if given, updates the profile row, then requests
    /// an email change when the address differs. Validation happens before
    /// any call is made.
    pub async fn save<S: BlobStore, A: AuthApi>(
        &mut self,
        store: &S,
        auth: &A,
        form: ProfileForm,
    ) -> ClientResult<SaveOutcome> {
        let current = self.profile.as_ref().ok_or(ClientError::NotLoaded)?;
        validate_full_name(&form.full_name)?;
        let email = form.email.trim();
        let email_changed = email != self.session.account.email;
        if email_changed {
            validate_email(email)?;
        }

        let profile_image_url = match form.image {
            Some(image) => Some(upload_image(store, self.session, image).await?),
            None => current.profile_image_url.clone(),
        };

        let profile = self
            .api
            .update_profile(
                self.session.user_id(),
                &ProfileUpdate {
                    full_name: form.full_name.trim().to_string(),
                    bio: optional_text(&form.bio),
                    skills: parse_skills(&form.skills),
                    profile_image_url,
                },
            )
            .await?;
        self.profile = Some(profile.clone());

        if email_changed {
            auth.update_email(self.session, email).await?;
            info!("Requested email change for {}", self.session.user_id());
        }

        Ok(SaveOutcome {
            profile,
            email_change_requested: email_changed,
        })
    }
}
