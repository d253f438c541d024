use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    catalog::Spectrum,
    dao::models::DraftRecord,
    dto::format_epoch_ms,
};

/// Optional catalog filters applied when drawing a spectrum for a draft.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateDraftRequest {
    /// Restrict the draw to spectra with this context tag.
    #[serde(default)]
    pub context: Option<String>,
    /// Restrict the draw to spectra with this difficulty tag.
    #[serde(default)]
    pub difficulty: Option<String>,
}

/// Draft returned to its host. The secret target is always visible here;
/// drafts exist only for the host's eyes.
#[derive(Debug, Serialize, ToSchema)]
pub struct DraftView {
    /// Identifier to publish with.
    pub draft_id: Uuid,
    /// Spectrum the round will be played on.
    pub spectrum: Spectrum,
    /// The hidden value players will try to guess.
    pub secret_target: u8,
    /// Creation time, RFC 3339.
    pub created_at: String,
    /// Expiry time, RFC 3339; publishing after this fails.
    pub expires_at: String,
}

impl DraftView {
    /// Assemble the host-facing view from the stored record and its spectrum.
    pub fn from_parts(record: DraftRecord, spectrum: Spectrum) -> Self {
        Self {
            draft_id: record.draft_id,
            spectrum,
            secret_target: record.secret_target,
            created_at: format_epoch_ms(record.created_at),
            expires_at: format_epoch_ms(record.expires_at),
        }
    }
}
