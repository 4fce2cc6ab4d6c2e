use crate::domain::user::GoogleProfile;
use crate::error::AppError;
use serde::{Deserialize, Serialize};

/// The Google profile forwarded by the OAuth callback.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleSignIn {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo: Option<String>,
}

impl TryFrom<GoogleSignIn> for GoogleProfile {
    type Error = AppError;

    fn try_from(body: GoogleSignIn) -> Result<Self, Self::Error> {
        let id = body
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::BadRequest("Invalid payload: \"id\" is required".to_string()))?;
        Ok(Self { id, display_name: body.display_name, email: body.email, photo: body.photo })
    }
}
