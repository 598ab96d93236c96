//! Inbound webhook payload and its validation into a routable signal.

use rust_decimal::Decimal;
use serde::Deserialize;

use super::OrderSide;
use crate::error::{FlareError, Result};

/// Alert kinds accepted on the webhook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertType {
    LongEntry,
    ShortEntry,
    LongExit,
    ShortExit,
}

impl AlertType {
    /// Parse an alert type, accepting both the canonical camel-case names
    /// and the TradingView-template spellings ("LONG_ENTRY").
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "longentry" => Ok(AlertType::LongEntry),
            "shortentry" => Ok(AlertType::ShortEntry),
            "longexit" => Ok(AlertType::LongExit),
            "shortexit" => Ok(AlertType::ShortExit),
            _ => Err(FlareError::Validation(format!(
                "unknown alertType '{}'; expected LongEntry|ShortEntry|LongExit|ShortExit",
                raw
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::LongEntry => "LongEntry",
            AlertType::ShortEntry => "ShortEntry",
            AlertType::LongExit => "LongExit",
            AlertType::ShortExit => "ShortExit",
        }
    }

    pub fn is_entry(&self) -> bool {
        matches!(self, AlertType::LongEntry | AlertType::ShortEntry)
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw webhook body as sent by the alerting tool
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalPayload {
    pub alert_type: String,
    #[serde(default)]
    pub reference_price: Option<Decimal>,
    #[serde(default)]
    pub trigger_price: Option<Decimal>,
    #[serde(default)]
    pub stop_loss: Option<Decimal>,
    #[serde(default)]
    pub lot_size: Option<Decimal>,
}

/// Price an entry order anchors on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPrice {
    /// Limit price for resting entries
    Reference(Decimal),
    /// Trigger price for stop-market entries
    Trigger(Decimal),
}

impl EntryPrice {
    pub fn value(&self) -> Decimal {
        match self {
            EntryPrice::Reference(p) | EntryPrice::Trigger(p) => *p,
        }
    }
}

/// Validated entry intent
#[derive(Debug, Clone)]
pub struct EntrySignal {
    pub side: OrderSide,
    pub price: EntryPrice,
    pub stop_loss: Option<Decimal>,
    pub lot_size: Option<Decimal>,
}

/// Normalized intent handed to the router
#[derive(Debug, Clone)]
pub enum Signal {
    Entry(EntrySignal),
    Exit,
}

impl Signal {
    /// Validate a raw payload into a routable signal. Entries require a
    /// positive reference or trigger price; any provided price or size
    /// must be positive.
    pub fn from_payload(payload: &SignalPayload) -> Result<(AlertType, Self)> {
        let alert_type = AlertType::parse(&payload.alert_type)?;

        if !alert_type.is_entry() {
            return Ok((alert_type, Signal::Exit));
        }

        let side = match alert_type {
            AlertType::LongEntry => OrderSide::Buy,
            AlertType::ShortEntry => OrderSide::Sell,
            _ => unreachable!(),
        };

        let price = match (payload.reference_price, payload.trigger_price) {
            (Some(p), _) => EntryPrice::Reference(p),
            (None, Some(p)) => EntryPrice::Trigger(p),
            (None, None) => {
                return Err(FlareError::Validation(
                    "entry alerts require referencePrice or triggerPrice".to_string(),
                ))
            }
        };

        if price.value() <= Decimal::ZERO {
            return Err(FlareError::Validation(
                "entry price must be positive".to_string(),
            ));
        }

        if let Some(stop) = payload.stop_loss {
            if stop <= Decimal::ZERO {
                return Err(FlareError::Validation(
                    "stopLoss must be positive".to_string(),
                ));
            }
        }

        if let Some(lot) = payload.lot_size {
            if lot <= Decimal::ZERO {
                return Err(FlareError::Validation(
                    "lotSize must be positive".to_string(),
                ));
            }
        }

        Ok((
            alert_type,
            Signal::Entry(EntrySignal {
                side,
                price,
                stop_loss: payload.stop_loss,
                lot_size: payload.lot_size,
            }),
        ))
    }
}
