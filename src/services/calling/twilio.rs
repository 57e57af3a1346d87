use anyhow::Context;
use async_trait::async_trait;

use super::CallProvider;

const CALL_TWIML: &str =
    "<Response><Say>Your repair order has an update. Please contact the shop.</Say></Response>";

pub struct TwilioVoiceProvider {
    account_sid: String,
    auth_token: String,
    from_number: String,
    client: reqwest::Client,
}

impl TwilioVoiceProvider {
    pub fn new(account_sid: String, auth_token: String, from_number: String) -> Self {
        Self {
            account_sid,
            auth_token,
            from_number,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CallProvider for TwilioVoiceProvider {
    async fn place_call(&self, to: &str) -> anyhow::Result<()> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Calls.json",
            self.account_sid
        );

        self.client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[
                ("To", to),
                ("From", &self.from_number),
                ("Twiml", CALL_TWIML),
            ])
            .send()
            .await
            .context("failed to start Twilio call")?
            .error_for_status()
            .context("Twilio API returned error")?;

        Ok(())
    }
}
