use color_eyre::eyre::{Context, Result};
use thiserror::Error;

pub mod api;
pub mod auth;

const HELIX_STREAMS_URL: &str = "https://api.twitch.tv/helix/streams";
const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";

#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn from_env() -> Result<Credentials> {
        Ok(Credentials {
            client_id: std::env::var("TWITCH_CLIENT_ID").context("TWITCH_CLIENT_ID not set")?,
            client_secret: std::env::var("TWITCH_CLIENT_SECRET")
                .context("TWITCH_CLIENT_SECRET not set")?,
        })
    }
}

#[derive(Debug, Error)]
pub enum TwitchError {
    /// The cached app token was rejected. Recovered by refreshing once and
    /// retrying the entity on the next tick.
    #[error("twitch rejected the app token")]
    Unauthorized,
    #[error("twitch returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
