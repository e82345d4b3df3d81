//! Refund aggregate and its accounting.
//!
//! Amounts are stored as decimal strings and recomputed with arbitrary
//! precision arithmetic; totals are rounded to the asset's precision with
//! banker's rounding.

use bigdecimal::{BigDecimal, RoundingMode};
use serde::{Deserialize, Serialize};

use crate::error::RpcError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundPayment {
    pub id: String,
    pub amount: String,
    pub fee: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refunds {
    pub amount_refunded: String,
    pub amount_fee: String,
    pub payments: Vec<RefundPayment>,
}

impl Default for Refunds {
    fn default() -> Self {
        Self {
            amount_refunded: "0".to_string(),
            amount_fee: "0".to_string(),
            payments: Vec::new(),
        }
    }
}

impl Refunds {
    /// Upsert a payment by id, consuming and returning the aggregate.
    /// A replaced payment keeps its original position; a new one is appended.
    pub fn with_payment(mut self, payment: RefundPayment) -> Self {
        match self.payments.iter_mut().find(|p| p.id == payment.id) {
            Some(slot) => *slot = payment,
            None => self.payments.push(payment),
        }
        self
    }

    /// Sum of principal and fee across all payments, rounded to `decimals`.
    pub fn total_refunded(&self, decimals: i64) -> Result<BigDecimal, RpcError> {
        let mut total = BigDecimal::from(0);
        for payment in &self.payments {
            total += decimal(&payment.amount)? + decimal(&payment.fee)?;
        }
        Ok(total.with_scale_round(decimals, RoundingMode::HalfEven))
    }

    /// Recompute `amount_refunded` and `amount_fee` from the payment list.
    /// Must run after every mutation of `payments`.
    pub fn recalculate(&mut self, decimals: i64) -> Result<(), RpcError> {
        let mut refunded = BigDecimal::from(0);
        let mut fees = BigDecimal::from(0);
        for payment in &self.payments {
            refunded += decimal(&payment.amount)? + decimal(&payment.fee)?;
            fees += decimal(&payment.fee)?;
        }
        self.amount_refunded = format_amount(&refunded, decimals);
        self.amount_fee = format_amount(&fees, decimals);
        Ok(())
    }
}

/// Parse a stored amount. Stored values were validated on the way in, so a
/// failure here means corrupted state rather than bad input.
pub fn decimal(value: &str) -> Result<BigDecimal, RpcError> {
    value
        .trim()
        .parse()
        .map_err(|_| RpcError::Internal(format!("stored amount [{value}] is not a valid decimal")))
}

/// Round to the asset precision (banker's rounding) and drop trailing zeros.
pub fn format_amount(value: &BigDecimal, decimals: i64) -> String {
    value
        .with_scale_round(decimals, RoundingMode::HalfEven)
        .normalized()
        .to_string()
}
