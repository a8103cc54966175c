use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{BackendError, Result};
use crate::models::{NewProfile, Profile, ProfileUpdate};

const PROFILE_COLUMNS: &str = "id, user_id, full_name, bio, skills, profile_image_url, created_at";

pub async fn get_profile(pool: &PgPool, user_id: Uuid) -> Result<Profile> {
    sqlx::query_as::<_, Profile>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = $1"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| BackendError::not_found("Profile", user_id))
}

pub async fn list_profiles_except(pool: &PgPool, user_id: Uuid) -> Result<Vec<Profile>> {
    let profiles = sqlx::query_as::<_, Profile>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id <> $1 ORDER BY created_at ASC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(profiles)
}

pub async fn list_profiles_by_ids(pool: &PgPool, user_ids: &[Uuid]) -> Result<Vec<Profile>> {
    if user_ids.is_empty() {
        return Ok(Vec::new());
    }

    let profiles = sqlx::query_as::<_, Profile>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ANY($1)"
    ))
    .bind(user_ids)
    .fetch_all(pool)
    .await?;

    Ok(profiles)
}

pub async fn insert_profile(pool: &PgPool, profile: &NewProfile) -> Result<Profile> {
    sqlx::query_as::<_, Profile>(&format!(
        r#"
        INSERT INTO profiles (user_id, full_name, bio, skills, profile_image_url)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {PROFILE_COLUMNS}
        "#
    ))
    .bind(profile.user_id)
    .bind(&profile.full_name)
    .bind(&profile.bio)
    .bind(&profile.skills)
    .bind(&profile.profile_image_url)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return BackendError::Conflict { entity: "Profile" };
            }
        }
        BackendError::Database(e)
    })
}

pub async fn update_profile(pool: &PgPool, user_id: Uuid, update: &ProfileUpdate) -> Result<Profile> {
    sqlx::query_as::<_, Profile>(&format!(
        r#"
        UPDATE profiles
        SET full_name = $2, bio = $3, skills = $4, profile_image_url = $5
        WHERE user_id = $1
        RETURNING {PROFILE_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(&update.full_name)
    .bind(&update.bio)
    .bind(&update.skills)
    .bind(&update.profile_image_url)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| BackendError::not_found("Profile", user_id))
}
