//! Telegram Bot API adapter.
//!
//! One [`TelegramClient`] serves both collaborator traits: membership checks
//! through `getChatMember` and user notifications through `sendMessage`.
//! Transport failures and malformed responses surface as
//! [`Error::OracleUnavailable`] so callers never mistake an outage for a
//! negative membership answer. The Bot API answers HTTP 400 for users it has
//! never seen in a chat; that one status maps to [`Membership::NotMember`].

use crate::{
    errors::{Error, Result},
    oracle::{Membership, MembershipOracle, Notifier, normalize_channel},
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_BASE: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Bot API response wrapper: `result` is present when `ok` is true,
/// `description` explains failures.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMember {
    status: String,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Statuses that count as being in the channel. `restricted`, `left`, and
/// `kicked` all mean the user is not a countable member.
fn membership_from_status(status: &str) -> Membership {
    match status {
        "creator" | "administrator" | "member" => Membership::Member,
        _ => Membership::NotMember,
    }
}

/// HTTP client for the Telegram Bot API.
pub struct TelegramClient {
    http: Client,
    base_url: String,
}

impl TelegramClient {
    /// Builds a client for the given bot token, with a bounded request
    /// timeout so a stalled API call cannot wedge a sweep.
    pub fn new(token: &str) -> Result<Self> {
        if token.trim().is_empty() {
            return Err(Error::Config {
                message: "telegram bot token must not be empty".to_string(),
            });
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|err| Error::Config {
                message: format!("failed to build HTTP client: {err}"),
            })?;

        Ok(Self {
            http,
            base_url: format!("{API_BASE}/bot{token}"),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }
}

impl std::fmt::Debug for TelegramClient {
    // The base URL embeds the bot token; never print it
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient").finish_non_exhaustive()
    }
}

#[async_trait]
impl MembershipOracle for TelegramClient {
    async fn is_member(&self, channel: &str, telegram_id: &str) -> Result<Membership> {
        let channel = normalize_channel(channel);

        let response = self
            .http
            .get(self.method_url("getChatMember"))
            .query(&[("chat_id", channel.as_str()), ("user_id", telegram_id)])
            .send()
            .await
            .map_err(|err| Error::OracleUnavailable {
                reason: err.to_string(),
            })?;

        if response.status() == StatusCode::BAD_REQUEST {
            return Ok(Membership::NotMember);
        }
        if !response.status().is_success() {
            return Err(Error::OracleUnavailable {
                reason: format!("getChatMember returned {}", response.status()),
            });
        }

        let body: ApiResponse<ChatMember> =
            response.json().await.map_err(|err| Error::OracleUnavailable {
                reason: err.to_string(),
            })?;

        match body.result {
            Some(chat_member) if body.ok => Ok(membership_from_status(&chat_member.status)),
            _ => Err(Error::OracleUnavailable {
                reason: body
                    .description
                    .unwrap_or_else(|| "malformed getChatMember response".to_string()),
            }),
        }
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send(&self, telegram_id: &str, text: &str) -> Result<()> {
        let payload = SendMessage {
            chat_id: telegram_id,
            text,
        };

        let response = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&payload)
            .send()
            .await
            .map_err(|err| Error::Notify(err.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Notify(format!(
                "sendMessage returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
