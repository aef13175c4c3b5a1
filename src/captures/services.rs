use tracing::{info, warn};
use uuid::Uuid;

use super::dto::ConfirmRequest;
use crate::{
    error::AppError,
    nutrition::{DayKey, MealEntry},
    state::AppState,
    storage::upload_entry_image,
};

/// Turns the user's ready capture into a logged entry.
///
/// The capture is consumed only once the entry is stored; on any failure it
/// is put back so the user can retry the confirmation.
pub async fn confirm(
    st: &AppState,
    user_id: Uuid,
    capture_id: Uuid,
    edits: ConfirmRequest,
) -> Result<(DayKey, MealEntry), AppError> {
    let ready = st.captures.take_ready(user_id, capture_id).await?;
    let day = edits.date.unwrap_or_else(|| st.today());

    let mut entry = match edits.to_entry(&ready.analysis) {
        Ok(entry) => entry,
        Err(e) => {
            st.captures.restore(user_id, ready).await;
            return Err(e.into());
        }
    };

    if let Some(storage) = &st.storage {
        match upload_entry_image(storage.as_ref(), user_id, entry.id, &ready.image).await {
            Ok(key) => entry.image_ref = Some(key),
            Err(e) => warn!(error = ?e, %user_id, "photo upload failed; logging without image"),
        }
    }

    if let Err(e) = st.store.add(user_id, day, entry.clone()).await {
        if let (Some(key), Some(storage)) = (&entry.image_ref, &st.storage) {
            if let Err(e) = storage.delete_object(key).await {
                warn!(error = ?e, %key, "orphaned photo not deleted");
            }
        }
        st.captures.restore(user_id, ready).await;
        return Err(AppError::Persistence(e));
    }

    if let Err(e) = st.store.record_use(user_id, &entry).await {
        warn!(error = ?e, %user_id, entry_id = %entry.id, "food history not updated");
    }
    info!(%user_id, %day, entry_id = %entry.id, capture_id = %capture_id, "capture logged");
    Ok((day, entry))
}
