use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ValidationError;
use super::value_objects::{Delivery, Item, Payment};

// ============================================================================
// Order Aggregate
// ============================================================================
//
// The order as it arrives on the queue, as it is cached, and as it is served
// over HTTP. Field names are the wire names.
//
// Orders are immutable once persisted: there is no update path, so the
// aggregate carries no version.
//
// ============================================================================

const MAX_ORDER_UID_LEN: usize = 128;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    pub delivery: Delivery,
    pub payment: Payment,
    #[serde(default)]
    pub items: Vec<Item>,
    pub locale: String,
    #[serde(default)]
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i32,
    pub date_created: DateTime<Utc>,
    pub oof_shard: String,
}

impl Order {
    /// Decode a queue payload
    pub fn from_json(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Check structural and business rules. Reports the first violation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("order_uid", &self.order_uid)?;
        if self.order_uid.chars().count() > MAX_ORDER_UID_LEN {
            return Err(ValidationError::Malformed {
                field: "order_uid",
                reason: "longer than 128 characters",
            });
        }
        if self.order_uid.chars().any(char::is_whitespace) {
            return Err(ValidationError::Malformed {
                field: "order_uid",
                reason: "contains whitespace",
            });
        }

        require("track_number", &self.track_number)?;
        require("entry", &self.entry)?;
        require("locale", &self.locale)?;
        require("customer_id", &self.customer_id)?;
        require("delivery_service", &self.delivery_service)?;

        self.validate_delivery()?;
        self.validate_payment()?;

        for item in &self.items {
            require("items.track_number", &item.track_number)?;
            require("items.name", &item.name)?;
            require("items.brand", &item.brand)?;
            non_negative("items.price", item.price)?;
            non_negative("items.sale", item.sale)?;
            non_negative("items.total_price", item.total_price)?;
        }

        Ok(())
    }

    fn validate_delivery(&self) -> Result<(), ValidationError> {
        let delivery = &self.delivery;

        require("delivery.name", &delivery.name)?;
        require("delivery.phone", &delivery.phone)?;
        require("delivery.city", &delivery.city)?;
        require("delivery.address", &delivery.address)?;
        require("delivery.email", &delivery.email)?;

        let digits = delivery.phone.strip_prefix('+').unwrap_or(&delivery.phone);
        if !digits.chars().all(|c| c.is_ascii_digit()) || !(5..=20).contains(&digits.len()) {
            return Err(ValidationError::Malformed {
                field: "delivery.phone",
                reason: "expected 5 to 20 digits with an optional leading +",
            });
        }

        match delivery.email.split_once('@') {
            Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {}
            _ => {
                return Err(ValidationError::Malformed {
                    field: "delivery.email",
                    reason: "expected local@domain",
                })
            }
        }

        Ok(())
    }

    fn validate_payment(&self) -> Result<(), ValidationError> {
        let payment = &self.payment;

        require("payment.transaction", &payment.transaction)?;
        require("payment.currency", &payment.currency)?;
        require("payment.provider", &payment.provider)?;

        if payment.currency.len() != 3 || !payment.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ValidationError::Malformed {
                field: "payment.currency",
                reason: "expected a three-letter uppercase code",
            });
        }

        non_negative("payment.amount", payment.amount)?;
        non_negative("payment.delivery_cost", payment.delivery_cost)?;
        non_negative("payment.goods_total", payment.goods_total)?;
        non_negative("payment.custom_fee", payment.custom_fee)?;

        Ok(())
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

fn non_negative(field: &'static str, value: i32) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::NegativeAmount { field, value });
    }
    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================
