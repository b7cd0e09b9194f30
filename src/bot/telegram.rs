//! Telegram Bot API client (getUpdates / sendMessage only)

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Extra time on top of the long-poll timeout before the HTTP client gives up
const CLIENT_TIMEOUT_SLACK: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    /// `None` for non-message updates and for messages that cannot be read,
    /// so one bad update never blocks the offset
    #[serde(default, deserialize_with = "readable_message")]
    pub message: Option<Message>,
}

fn readable_message<'de, D>(deserializer: D) -> std::result::Result<Option<Message>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(value) = Option::<serde_json::Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    match serde_json::from_value(value) {
        Ok(message) => Ok(Some(message)),
        Err(e) => {
            tracing::warn!("Skipping unreadable message: {}", e);
            Ok(None)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetUpdates<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str, poll_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(poll_timeout + CLIENT_TIMEOUT_SLACK)
            .build()?;

        Ok(Self {
            http,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        })
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, method);
        // Request URLs carry the token, keep them out of error messages
        let response: ApiResponse<T> = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?
            .json()
            .await
            .map_err(reqwest::Error::without_url)?;

        match (response.ok, response.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(Error::Telegram {
                description: response
                    .description
                    .unwrap_or_else(|| format!("{} returned no result", method)),
            }),
        }
    }

    /// Long-poll for message updates starting at `offset`
    pub async fn get_updates(&self, offset: i64, timeout: u64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            &GetUpdates {
                offset,
                timeout,
                allowed_updates: &["message"],
            },
        )
        .await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let _: serde_json::Value = self
            .call("sendMessage", &SendMessage { chat_id, text })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_updates_without_message() {
        let raw = r#"{"ok":true,"result":[
            {"update_id":10,"message":{"message_id":1,"chat":{"id":42,"type":"private"},"text":"/stats"}},
            {"update_id":11,"edited_message":{"message_id":1,"chat":{"id":42}}}
        ]}"#;
        let response: ApiResponse<Vec<Update>> = serde_json::from_str(raw).unwrap();

        let updates = response.result.unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].message.as_ref().unwrap().chat.id, 42);
        assert!(updates[1].message.is_none());
    }

    #[test]
    fn test_unreadable_message_does_not_fail_batch() {
        let raw = r#"{"ok":true,"result":[
            {"update_id":20,"message":{"message_id":1,"text":"/stats"}},
            {"update_id":21,"message":{"message_id":2,"chat":{"id":"not-a-number"}}},
            {"update_id":22,"message":{"message_id":3,"chat":{"id":7},"text":"/start"}}
        ]}"#;
        let response: ApiResponse<Vec<Update>> = serde_json::from_str(raw).unwrap();

        let updates = response.result.unwrap();
        let ids: Vec<i64> = updates.iter().map(|u| u.update_id).collect();
        assert_eq!(ids, vec![20, 21, 22]);
        assert!(updates[0].message.is_none());
        assert!(updates[1].message.is_none());
        assert_eq!(updates[2].message.as_ref().unwrap().chat.id, 7);
    }

    #[test]
    fn test_get_updates_body() {
        let body = serde_json::to_value(GetUpdates {
            offset: 5,
            timeout: 30,
            allowed_updates: &["message"],
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "offset": 5, "timeout": 30, "allowed_updates": ["message"] })
        );
    }
}
