use enginelink_common::time::{self, Duration};
use serde::{Deserialize, Serialize};

/// Identity record served by the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    pub name: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colab_url: Option<String>,
    #[serde(default)]
    pub secondary_accounts: Vec<AccountRef>,
}

/// A linked account, redacted to its email. Tokens never cross this boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRef {
    pub email: String,
}

/// A linked account carried on a write. The token blob arrives already
/// encrypted; this layer treats it as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryAccount {
    pub email: String,
    pub encrypted_token: String,
}

/// Fields accepted by the user-record upsert. Unset fields are left untouched;
/// `secondary_account` upserts into the list by email.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colab_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_account: Option<SecondaryAccount>,
}

/// Redacted view of the persisted record returned from a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub email: String,
    pub colab_url: Option<String>,
    #[serde(default)]
    pub secondary_accounts: Vec<AccountRef>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("user not found")]
    NotFound,
    #[error("{0}")]
    Backend(String),
}

/// The external per-user record store, keyed by account email.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn update_user(&self, email: &str, update: UserUpdate) -> Result<UserRecord, StoreError>;
}

/// The authenticated session layer. `refresh` forces a re-fetch of the
/// identity record; the updated value is observed through `current`.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait::async_trait]
pub trait IdentityBridge: Send + Sync {
    fn current(&self) -> Option<Identity>;
    fn loading(&self) -> bool;
    async fn refresh(&self);
}

/// Failures after validation succeeded. Kept apart from connection errors so
/// the UI can say which step failed.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The user-record write itself failed.
    #[error("failed to save the engine URL: {0}")]
    SaveFailed(String),
    /// The write went through but the refreshed session never served it back.
    #[error("the session did not pick up the saved engine URL in time")]
    PropagationTimeout,
}

/// Persists a validated endpoint and waits for the session layer to serve it
/// back. The UI reads the endpoint from the session, not from the write
/// acknowledgment, so success means the read path reflects the new value.
///
/// The confirmation poll is bounded by `max_wait` and fails closed.
pub async fn persist_and_confirm<S, B>(
    store: &S,
    bridge: &B,
    email: &str,
    endpoint: &str,
    poll_interval: Duration,
    max_wait: Duration,
) -> Result<(), SyncError>
where
    S: UserStore + ?Sized,
    B: IdentityBridge + ?Sized,
{
    store
        .update_user(
            email,
            UserUpdate {
                colab_url: Some(endpoint.to_string()),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| SyncError::SaveFailed(e.to_string()))?;

    bridge.refresh().await;

    let confirmed = time::timeout(max_wait, async {
        loop {
            let visible = bridge
                .current()
                .and_then(|identity| identity.colab_url)
                .is_some_and(|url| url == endpoint);
            if visible {
                break;
            }
            time::sleep(poll_interval).await;
            bridge.refresh().await;
        }
    })
    .await;

    match confirmed {
        Ok(()) => {
            tracing::debug!(endpoint, "engine URL propagated to the session");
            Ok(())
        }
        Err(_) => Err(SyncError::PropagationTimeout),
    }
}
