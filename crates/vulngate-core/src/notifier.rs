use crate::config::NotifySettings;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use std::time::Duration;

pub const TOKEN_ENV: &str = "TELEGRAM_TOKEN";
pub const CHAT_ID_ENV: &str = "TELEGRAM_CHAT_ID";

/// Bot credentials, supplied out-of-band through the environment.
#[derive(Clone)]
pub struct Credentials {
    pub token: String,
    pub chat_id: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"****")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

impl Credentials {
    /// Read `TELEGRAM_TOKEN` and `TELEGRAM_CHAT_ID`; `None` if either is
    /// missing or empty.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let token = lookup(TOKEN_ENV).filter(|t| !t.is_empty())?;
        let chat_id = lookup(CHAT_ID_ENV).filter(|c| !c.is_empty())?;
        Some(Self { token, chat_id })
    }
}

#[derive(Debug, Serialize, PartialEq)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
}

/// Posts plain-text messages to a chat through the Telegram bot API.
///
/// Fire-and-forget: the response body is not inspected and nothing is retried.
pub struct TelegramNotifier {
    client: reqwest::Client,
    credentials: Credentials,
    api_base: String,
    parse_mode: Option<String>,
}

impl TelegramNotifier {
    pub fn new(credentials: Credentials, settings: &NotifySettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("vulngate/", env!("CARGO_PKG_VERSION"))),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            credentials,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            parse_mode: settings.parse_mode.clone().filter(|m| !m.is_empty()),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.credentials.token)
    }

    fn payload<'a>(&'a self, text: &'a str) -> SendMessage<'a> {
        SendMessage {
            chat_id: &self.credentials.chat_id,
            text,
            parse_mode: self.parse_mode.as_deref(),
        }
    }

    /// Send `text`. Errors are transport failures only; the URL is stripped
    /// from them so the bot token never reaches logs.
    pub async fn send(&self, text: &str) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint())
            .json(&self.payload(text))
            .send()
            .await
            .map_err(|e| e.without_url())
            .context("Failed to post chat notification")?;

        tracing::debug!(status = %response.status(), "chat notification posted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn creds() -> Credentials {
        Credentials {
            token: "123:abc".to_string(),
            chat_id: "-42".to_string(),
        }
    }

    #[test]
    fn test_credentials_require_both_values() {
        let both = Credentials::from_lookup(|k| Some(format!("{}-value", k)));
        assert!(both.is_some());

        let no_chat =
            Credentials::from_lookup(|k| (k == TOKEN_ENV).then(|| "t".to_string()));
        assert!(no_chat.is_none());

        let empty = Credentials::from_lookup(|_| Some(String::new()));
        assert!(empty.is_none());
    }

    #[test]
    fn test_debug_hides_token() {
        let rendered = format!("{:?}", creds());
        assert!(!rendered.contains("abc"));
        assert!(rendered.contains("-42"));
    }

    #[test]
    fn test_endpoint_and_payload() {
        let settings = NotifySettings {
            api_base: "https://api.telegram.org/".to_string(),
            parse_mode: Some("Markdown".to_string()),
        };
        let notifier = TelegramNotifier::new(creds(), &settings).unwrap();
        assert_eq!(notifier.endpoint(), "https://api.telegram.org/bot123:abc/sendMessage");

        let body = serde_json::to_value(notifier.payload("scan passed")).unwrap();
        assert_eq!(body["chat_id"], "-42");
        assert_eq!(body["text"], "scan passed");
        assert_eq!(body["parse_mode"], "Markdown");
    }

    #[test]
    fn test_default_settings_send_plain_text() {
        let notifier = TelegramNotifier::new(creds(), &NotifySettings::default()).unwrap();
        let text = "vulngate REJECT: 1 of 2 files flagged as vulnerable in .: src/db_utils/run_query.py";
        let body = serde_json::to_value(notifier.payload(text)).unwrap();
        assert!(body.get("parse_mode").is_none());
        assert_eq!(body["text"], text);
    }

    #[test]
    fn test_empty_parse_mode_is_omitted() {
        let settings = NotifySettings {
            api_base: "http://localhost".to_string(),
            parse_mode: Some(String::new()),
        };
        let notifier = TelegramNotifier::new(creds(), &settings).unwrap();
        let body = serde_json::to_value(notifier.payload("hi")).unwrap();
        assert!(body.get("parse_mode").is_none());
    }

    #[tokio::test]
    async fn test_send_posts_json_to_bot_endpoint() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            // read until the headers and the whole JSON body have arrived
            loop {
                let complete = {
                    let seen = String::from_utf8_lossy(&buf);
                    seen.contains("\r\n\r\n") && seen.ends_with('}')
                };
                if complete {
                    break;
                }
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 11\r\nconnection: close\r\n\r\n{\"ok\":true}")
                .await
                .unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        });

        let settings = NotifySettings {
            api_base: format!("http://{}", addr),
            parse_mode: None,
        };
        let notifier = TelegramNotifier::new(creds(), &settings).unwrap();
        notifier.send("vulngate REJECT").await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /bot123:abc/sendMessage"));
        assert!(request.contains("\"chat_id\":\"-42\""));
        assert!(request.contains("\"text\":\"vulngate REJECT\""));
    }

    #[tokio::test]
    async fn test_send_error_does_not_leak_token() {
        // nothing listens on port 9 of localhost in the test environment
        let settings = NotifySettings {
            api_base: "http://127.0.0.1:9".to_string(),
            parse_mode: None,
        };
        let notifier = TelegramNotifier::new(creds(), &settings).unwrap();
        let err = notifier.send("hi").await.unwrap_err();
        assert!(!format!("{:#}", err).contains("123:abc"));
    }
}
