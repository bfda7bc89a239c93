//! Outbound SMS and telephony gateways
//!
//! Both gateways sit behind trait objects so the handlers never care
//! which provider (or the logging console fallback, used when no
//! credentials are configured) is wired in. Provider calls go through
//! the shared bounded-retry helper.

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{error, info};

use common::retry::{RetryPolicy, retry_with_backoff};

/// Custom error type for gateway operations
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Error occurred while talking to the provider
    #[error("Gateway transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The provider rejected the request
    #[error("Gateway provider error: {0}")]
    Provider(String),

    /// Configuration error
    #[error("Gateway configuration error: {0}")]
    Configuration(String),
}

/// Outbound SMS delivery
#[async_trait]
pub trait SmsGateway: Send + Sync {
    /// Send a text, returning the provider's message id
    async fn send(&self, phone: &str, message: &str) -> Result<String, GatewayError>;
}

/// Outbound call placement
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Place a call that will fetch its instructions from `webhook_url`;
    /// returns the provider's call id
    async fn place_call(&self, phone: &str, webhook_url: &str) -> Result<String, GatewayError>;
}

/// NetGSM configuration
#[derive(Debug, Clone)]
pub struct NetgsmConfig {
    pub username: String,
    pub password: String,
    /// Sender header shown to the recipient
    pub header: String,
}

impl NetgsmConfig {
    /// Create a new NetgsmConfig from environment variables
    ///
    /// # Environment Variables
    /// - `NETGSM_USERNAME`, `NETGSM_PASSWORD`: API credentials
    /// - `NETGSM_HEADER`: sender header (default: "IZINPORTAL")
    pub fn from_env() -> Result<Self, GatewayError> {
        let username = std::env::var("NETGSM_USERNAME").map_err(|_| {
            GatewayError::Configuration("NETGSM_USERNAME environment variable not set".into())
        })?;
        let password = std::env::var("NETGSM_PASSWORD").map_err(|_| {
            GatewayError::Configuration("NETGSM_PASSWORD environment variable not set".into())
        })?;
        let header = std::env::var("NETGSM_HEADER").unwrap_or_else(|_| "IZINPORTAL".to_string());

        Ok(NetgsmConfig {
            username,
            password,
            header,
        })
    }
}

/// SMS gateway backed by the NetGSM HTTP API
pub struct NetgsmGateway {
    client: Client,
    config: NetgsmConfig,
    retry: RetryPolicy,
}

impl NetgsmGateway {
    pub fn new(config: NetgsmConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            retry: RetryPolicy::default(),
        }
    }

    /// NetGSM wants `90…` without a plus sign
    fn provider_phone(phone: &str) -> String {
        let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
        if let Some(rest) = digits.strip_prefix('0') {
            return format!("90{rest}");
        }
        if digits.starts_with("90") {
            return digits;
        }
        format!("90{digits}")
    }
}

#[async_trait]
impl SmsGateway for NetgsmGateway {
    async fn send(&self, phone: &str, message: &str) -> Result<String, GatewayError> {
        let gsmno = Self::provider_phone(phone);

        retry_with_backoff(&self.retry, "netgsm send", || async {
            let response = self
                .client
                .get("https://api.netgsm.com.tr/sms/send/get")
                .query(&[
                    ("usercode", self.config.username.as_str()),
                    ("password", self.config.password.as_str()),
                    ("gsmno", gsmno.as_str()),
                    ("message", message),
                    ("msgheader", self.config.header.as_str()),
                    ("filter", "0"),
                ])
                .send()
                .await
                .map_err(GatewayError::Transport)?;

            let body = response.text().await.map_err(GatewayError::Transport)?;

            // "00 <id>" signals acceptance
            match body.strip_prefix("00 ") {
                Some(id) => {
                    info!("SMS accepted by NetGSM, message id {}", id);
                    Ok(id.trim().to_string())
                }
                None => Err(GatewayError::Provider(body)),
            }
        })
        .await
    }
}

/// Twilio configuration
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

impl TwilioConfig {
    /// Create a new TwilioConfig from environment variables
    ///
    /// # Environment Variables
    /// - `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN`: API credentials
    /// - `TWILIO_PHONE_NUMBER`: caller id for outbound calls
    pub fn from_env() -> Result<Self, GatewayError> {
        let account_sid = std::env::var("TWILIO_ACCOUNT_SID").map_err(|_| {
            GatewayError::Configuration("TWILIO_ACCOUNT_SID environment variable not set".into())
        })?;
        let auth_token = std::env::var("TWILIO_AUTH_TOKEN").map_err(|_| {
            GatewayError::Configuration("TWILIO_AUTH_TOKEN environment variable not set".into())
        })?;
        let from_number = std::env::var("TWILIO_PHONE_NUMBER").map_err(|_| {
            GatewayError::Configuration("TWILIO_PHONE_NUMBER environment variable not set".into())
        })?;

        Ok(TwilioConfig {
            account_sid,
            auth_token,
            from_number,
        })
    }
}

/// Voice gateway backed by the Twilio calls API
pub struct TwilioVoiceGateway {
    client: Client,
    config: TwilioConfig,
    retry: RetryPolicy,
}

impl TwilioVoiceGateway {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            retry: RetryPolicy::default(),
        }
    }
}

#[async_trait]
impl VoiceGateway for TwilioVoiceGateway {
    async fn place_call(&self, phone: &str, webhook_url: &str) -> Result<String, GatewayError> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Calls.json",
            self.config.account_sid
        );

        retry_with_backoff(&self.retry, "twilio place_call", || async {
            let response = self
                .client
                .post(&url)
                .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
                .form(&[
                    ("To", phone),
                    ("From", self.config.from_number.as_str()),
                    ("Url", webhook_url),
                    ("Method", "POST"),
                ])
                .send()
                .await
                .map_err(GatewayError::Transport)?;

            let status = response.status();
            let payload: serde_json::Value =
                response.json().await.map_err(GatewayError::Transport)?;

            if !status.is_success() {
                return Err(GatewayError::Provider(payload.to_string()));
            }

            let sid = payload
                .get("sid")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            info!("Voice call initiated, sid {}", sid);
            Ok(sid)
        })
        .await
    }
}

/// Logging SMS gateway for offline operation
pub struct ConsoleSmsGateway;

#[async_trait]
impl SmsGateway for ConsoleSmsGateway {
    async fn send(&self, phone: &str, message: &str) -> Result<String, GatewayError> {
        info!("SMS to {} (console mode): {}", phone, message);
        Ok("console".to_string())
    }
}

/// Logging voice gateway for offline operation
pub struct ConsoleVoiceGateway;

#[async_trait]
impl VoiceGateway for ConsoleVoiceGateway {
    async fn place_call(&self, phone: &str, webhook_url: &str) -> Result<String, GatewayError> {
        info!(
            "Voice call to {} (console mode), webhook {}",
            phone, webhook_url
        );
        Ok("console-call".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn netgsm_phone_format() {
        assert_eq!(NetgsmGateway::provider_phone("05551234567"), "905551234567");
        assert_eq!(NetgsmGateway::provider_phone("+905551234567"), "905551234567");
        assert_eq!(NetgsmGateway::provider_phone("5551234567"), "905551234567");
        assert_eq!(NetgsmGateway::provider_phone("905551234567"), "905551234567");
    }

    #[tokio::test]
    async fn console_gateways_always_succeed() {
        let sms = ConsoleSmsGateway;
        assert_eq!(sms.send("5551234567", "test").await.unwrap(), "console");

        let voice = ConsoleVoiceGateway;
        assert_eq!(
            voice
                .place_call("+905551234567", "http://localhost/api/voice/webhook?id=x")
                .await
                .unwrap(),
            "console-call"
        );
    }
}
