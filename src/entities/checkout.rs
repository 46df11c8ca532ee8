use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const WALLET_CREDIT_KIND: &str = "wallet_credit";

/// Body accepted by the checkout-session edge function.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CheckoutRequest {
    pub kind: String,
    /// Minor units (fils).
    pub amount: i64,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: HashMap<String, String>,
}

impl CheckoutRequest {
    pub fn wallet_credit(amount: f64, app_origin: &str) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert(
            "description".to_string(),
            format!("Wallet Top-Up - AED {}", amount),
        );

        Self {
            kind: WALLET_CREDIT_KIND.into(),
            amount: (amount * 100.0).round() as i64,
            success_url: format!(
                "{}/payment-success?session_id={{CHECKOUT_SESSION_ID}}",
                app_origin
            ),
            cancel_url: format!("{}/wallet", app_origin),
            metadata,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct CheckoutSession {
    pub url: Option<String>,
    #[serde(alias = "sessionId")]
    pub session_id: Option<String>,
    pub order_id: Option<String>,
}

/// Where the UI sends the browser to finish paying. Control leaves the
/// application here; completion shows up on the next balance fetch.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TopUpRedirect {
    Url {
        url: String,
        order_id: Option<String>,
    },
    StripeSession {
        session_id: String,
        publishable_key: String,
        order_id: Option<String>,
    },
}

#[test]
fn wallet_credit_request_test() {
    let request = CheckoutRequest::wallet_credit(150.5, "https://sublimes.ae");

    assert_eq!(request.kind, "wallet_credit");
    assert_eq!(request.amount, 15050);
    assert_eq!(
        request.success_url,
        "https://sublimes.ae/payment-success?session_id={CHECKOUT_SESSION_ID}"
    );
    assert_eq!(request.cancel_url, "https://sublimes.ae/wallet");
    assert_eq!(
        request.metadata.get("description").map(String::as_str),
        Some("Wallet Top-Up - AED 150.5")
    );
}

#[test]
fn checkout_session_accepts_camel_case_session_id() {
    let session: CheckoutSession =
        serde_json::from_str(r#"{"sessionId":"cs_test_1","order_id":"ord_1"}"#).unwrap();

    assert_eq!(session.session_id.as_deref(), Some("cs_test_1"));
    assert!(session.url.is_none());
}
