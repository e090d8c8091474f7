//! Client-facing configuration metadata.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// What a frontend needs to brand itself and format money
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfigResponse {
    pub organization: Option<String>,
    pub title: Option<String>,
    /// ISO 4217 code used for deal values and MRR
    pub currency: String,
}
