//! OAuth2 client-credentials flow. The app token is fetched lazily by
//! [`api::HelixClient`](super::api::HelixClient) and cached until a 401
//! invalidates it.

use serde::Deserialize;
use tracing::debug;

use super::{Credentials, TwitchError, TOKEN_URL};

#[derive(Debug, Clone, Deserialize)]
pub struct AppToken {
    pub access_token: String,
    pub expires_in: u64,
    pub token_type: String,
}

pub async fn fetch_app_token(
    http: &reqwest::Client,
    credentials: &Credentials,
) -> Result<AppToken, TwitchError> {
    let res = http
        .post(TOKEN_URL)
        .form(&[
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ])
        .send()
        .await?;

    let status = res.status();
    if !status.is_success() {
        return Err(TwitchError::Status {
            status: status.as_u16(),
            body: res.text().await.unwrap_or_default(),
        });
    }

    let token: AppToken = res.json().await?;
    debug!("obtained twitch app token, expires in {}s", token.expires_in);
    Ok(token)
}
