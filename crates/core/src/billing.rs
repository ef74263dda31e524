//! Subscription plans and the hosted checkout hand-off.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{error::TransportError, http::HttpClient};

/// Shown when checkout cannot be started.
pub const BILLING_TEST_MODE_MESSAGE: &str =
    "Billing system is in test mode. Backend not reachable.";

const CHECKOUT_PATH: &str = "/billing/create-checkout-session";

/// A purchasable subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Plan {
    /// Billed every month.
    #[serde(rename = "monthly")]
    Monthly,
    /// Billed once a year.
    #[serde(rename = "year")]
    Yearly,
}

impl Plan {
    /// Every plan, in display order.
    pub const ALL: [Plan; 2] = [Plan::Monthly, Plan::Yearly];

    /// Marketing name.
    pub fn name(self) -> &'static str {
        match self {
            Plan::Monthly => "Monthly Mission",
            Plan::Yearly => "Yearly Voyage",
        }
    }

    /// Price in euro cents.
    pub fn amount_cents(self) -> u32 {
        match self {
            Plan::Monthly => 1_900,
            Plan::Yearly => 19_000,
        }
    }

    /// `€19/mo` style label.
    pub fn price_label(self) -> String {
        let suffix = match self {
            Plan::Monthly => "mo",
            Plan::Yearly => "yr",
        };
        format!("€{}/{suffix}", self.amount_cents() / 100)
    }

    /// Included features.
    pub fn features(self) -> &'static [&'static str] {
        match self {
            Plan::Monthly => &["7-Day Forecast", "Basic Trends", "CSV Upload", "Email Support"],
            Plan::Yearly => &[
                "All Monthly Features",
                "Priority Support",
                "Advanced Seasonality",
                "Custom Export",
            ],
        }
    }

    /// Extra line under the price, if any.
    pub fn tagline(self) -> Option<&'static str> {
        match self {
            Plan::Monthly => None,
            Plan::Yearly => Some("Save 2 months"),
        }
    }

    /// Label of the purchase action.
    pub fn action_label(self) -> &'static str {
        match self {
            Plan::Monthly => "Launch Monthly",
            Plan::Yearly => "Launch Yearly",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Serialize)]
struct CheckoutRequest {
    plan: Plan,
}

/// `POST /billing/create-checkout-session` reply.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Provider session id.
    #[serde(default, rename = "sessionId")]
    pub session_id: Option<String>,
    /// Hosted checkout page.
    #[serde(default)]
    pub url: Option<String>,
}

impl HttpClient {
    /// Ask the backend to open a checkout session for `plan`.
    pub async fn create_checkout_session(
        &self,
        plan: Plan,
    ) -> Result<CheckoutSession, TransportError> {
        self.post_json(CHECKOUT_PATH, &CheckoutRequest { plan }).await
    }
}

/// Start checkout and return the hosted page address.
pub async fn checkout(client: &HttpClient, plan: Plan) -> Result<String, TransportError> {
    let session = client.create_checkout_session(plan).await?;
    let url = session
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| TransportError::Decode("checkout session has no url".to_string()))?;
    info!(plan = ?plan, session = ?session.session_id, "checkout session created");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        http::test_support::{client, serve_once, unreachable_base_url},
        store::TokenStore,
    };
    use tempfile::tempdir;

    #[test]
    fn plans_describe_themselves() {
        assert_eq!(Plan::Monthly.price_label(), "€19/mo");
        assert_eq!(Plan::Yearly.price_label(), "€190/yr");
        assert_eq!(Plan::Monthly.features().len(), 4);
        assert_eq!(Plan::Yearly.features()[0], "All Monthly Features");
        assert_eq!(serde_json::to_string(&Plan::Yearly).unwrap(), r#""year""#);
    }

    #[tokio::test]
    async fn checkout_returns_hosted_url() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let tokens = TokenStore::new(dir.path().join("session.json"));
        let (base, handle) = serve_once(
            "200 OK",
            r#"{"sessionId":"cs_test_1","url":"https://checkout.example/cs_test_1"}"#,
        )
        .await;

        let url = checkout(&client(&base, tokens), Plan::Monthly).await?;
        let request = handle.await?;
        assert!(request.starts_with("POST /api/billing/create-checkout-session "));
        assert!(request.contains(r#"{"plan":"monthly"}"#));
        assert_eq!(url, "https://checkout.example/cs_test_1");
        Ok(())
    }

    #[tokio::test]
    async fn missing_url_is_a_decode_error() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let tokens = TokenStore::new(dir.path().join("session.json"));
        let (base, handle) = serve_once("200 OK", r#"{"sessionId":"cs_test_2"}"#).await;

        let result = checkout(&client(&base, tokens), Plan::Yearly).await;
        handle.await?;
        assert!(matches!(result, Err(TransportError::Decode(_))));
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_backend_fails_checkout() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let tokens = TokenStore::new(dir.path().join("session.json"));
        let result = checkout(&client(&unreachable_base_url().await, tokens), Plan::Monthly).await;
        assert!(matches!(result, Err(TransportError::Connect(_))));
        Ok(())
    }
}
