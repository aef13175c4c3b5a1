use serde::Deserialize;

/// Replacement for the identity fields of a profile.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub photo_ref: Option<String>,
}
