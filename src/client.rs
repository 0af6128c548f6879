use crate::config::Config;
use crate::error::ClientError;
use crate::identity::UserIdentity;
use serde::{Deserialize, Serialize};
use tokio::time::Duration;

/// Request body sent to the chat backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub user_id: String,
}

/// Response body from the chat backend
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
    /// Earlier `(user_msg, bot_reply)` pairs, when the backend includes them
    #[serde(default)]
    pub history: Vec<(String, String)>,
}

/// HTTP client for the chat backend
#[derive(Clone)]
pub struct ChatClient {
    endpoint: String,
    client: reqwest::Client,
}

impl ChatClient {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(ClientError::Setup)?;

        Ok(Self {
            endpoint: config.backend_url.clone(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one message and wait for the backend's reply text
    pub async fn send_message(
        &self,
        text: &str,
        user: &UserIdentity,
    ) -> Result<String, ClientError> {
        let payload = ChatRequest {
            message: text.to_string(),
            user_id: user.as_str().to_string(),
        };

        tracing::debug!(endpoint = %self.endpoint, user_id = %user, "Sending chat message");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(ClientError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(ClientError::Transport)?;

        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(ClientError::Decode)?;
        Ok(parsed.reply)
    }
}
