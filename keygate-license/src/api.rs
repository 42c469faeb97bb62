//! Serializable shapes exchanged with the UI process.

use crate::error::{ErrorKind, LicenseResult};
use crate::validator::ActivationOutcome;
use serde::{Deserialize, Serialize};

/// Reply to an activation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationResponse {
    /// The key is the current license.
    pub success: bool,
    /// Why activation failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl From<LicenseResult<ActivationOutcome>> for ActivationResponse {
    fn from(result: LicenseResult<ActivationOutcome>) -> Self {
        match result {
            Ok(_) => Self {
                success: true,
                error: None,
            },
            Err(e) => Self {
                success: false,
                error: Some(e.kind()),
            },
        }
    }
}
