//! Checkout payload handed to the cashier terminal.

use std::fmt;

use common::BasketId;
use serde::Serialize;

/// Opaque payload identifying a basket at the register.
///
/// The payload text is the basket id, so a terminal scanning it can call
/// `decide` directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CheckoutPayload(String);

impl CheckoutPayload {
    pub fn for_basket(basket_id: &BasketId) -> Self {
        Self(basket_id.to_string())
    }

    /// Recovers the basket id from a scanned payload.
    pub fn basket_id(&self) -> BasketId {
        BasketId::new(self.0.as_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CheckoutPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Renders a checkout payload into something a terminal can scan.
pub trait QrEncoder: Send + Sync {
    fn encode(&self, payload: &CheckoutPayload) -> String;
}

/// Passes the payload through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextEncoder;

impl QrEncoder for PlainTextEncoder {
    fn encode(&self, payload: &CheckoutPayload) -> String {
        payload.as_str().to_string()
    }
}
