//! check_credentials tool implementation.

use bracketeer_client::{CredentialCheck, Credentials, TrueFinalsClient, TrueFinalsConfig, check_credentials};
use bracketeer_core::{AppConfig, Error};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Result of the credential-order self-check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialStatus {
    /// `valid`, `swapped`, `invalid` or `unreachable`.
    pub status: String,
    pub message: Option<String>,
}

impl From<CredentialCheck> for CredentialStatus {
    fn from(check: CredentialCheck) -> Self {
        Self { status: check.status().to_string(), message: check.message() }
    }
}

/// Run the self-check against TrueFinals with the configured pair.
pub async fn verify_configured(config: &AppConfig) -> Result<CredentialStatus, Error> {
    let (user_id, api_key) = config
        .require_credentials()
        .map_err(|e| Error::MissingCredentials(e.to_string()))?;
    let credentials = Credentials::new(user_id, api_key);
    let base = TrueFinalsConfig::from_app_config(config);

    let check = check_credentials(&credentials, |creds| TrueFinalsClient::new(base.clone().with_credentials(creds))).await;
    Ok(check.into())
}

/// Implementation of the check_credentials tool.
pub async fn credentials_impl(config: &AppConfig) -> Result<CallToolResult, McpError> {
    json_result(&verify_configured(config).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_credentials_error() {
        let err = credentials_impl(&AppConfig::default()).await.unwrap_err();
        assert_eq!(err.code.0, -32009);
        assert!(err.message.contains("truefinals_user_id"));
    }

    #[test]
    fn test_status_from_check() {
        let status = CredentialStatus::from(CredentialCheck::Swapped);
        assert_eq!(status.status, "swapped");
        assert!(status.message.unwrap().contains("backwards"));
        assert!(CredentialStatus::from(CredentialCheck::Valid).message.is_none());
    }
}
