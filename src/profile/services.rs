use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{error::AppError, nutrition::UserProfile, state::AppState};

/// Reads the user's profile, creating and storing the defaults on first use.
pub async fn load_or_create(st: &AppState, user: Uuid) -> Result<UserProfile, AppError> {
    if let Some(profile) = st
        .store
        .load_profile(user)
        .await
        .map_err(AppError::Persistence)?
    {
        return Ok(profile);
    }
    let profile = UserProfile::first_use(OffsetDateTime::now_utc());
    st.store
        .save_profile(user, &profile)
        .await
        .map_err(AppError::Persistence)?;
    info!(%user, "created default profile");
    Ok(profile)
}

pub async fn save(st: &AppState, user: Uuid, profile: &UserProfile) -> Result<(), AppError> {
    st.store
        .save_profile(user, profile)
        .await
        .map_err(AppError::Persistence)
}
