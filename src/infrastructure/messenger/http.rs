use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::{Messenger, MessengerError, OutboundMessage};

/// Timeout for a single bridge request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts every outbound message as JSON to the messaging bridge.
#[derive(Clone)]
pub struct HttpMessenger {
    client: reqwest::Client,
    url: String,
}

impl HttpMessenger {
    pub fn new(url: &str) -> Result<Self, MessengerError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        info!("✅ Messaging bridge at {}", url);
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Messenger for HttpMessenger {
    async fn send(&self, message: OutboundMessage) -> Result<(), MessengerError> {
        let response = self.client.post(&self.url).json(&message).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(MessengerError::HttpStatus(status.as_u16()))
        }
    }
}
