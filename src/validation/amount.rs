//! Monetary amount validation against the asset catalog.

use bigdecimal::BigDecimal;

use crate::asset::{asset_code, AssetCatalog};
use crate::error::RpcError;

/// Validate an amount expressed in `asset` (a SEP-38 identifier or bare code).
///
/// Non-fee amounts must be strictly positive; fee amounts (`fee_semantics`)
/// may be zero. The number of fractional digits must not exceed the asset's
/// precision.
pub fn validate_amount_asset(
    field: &str,
    amount: &str,
    asset: &str,
    assets: &AssetCatalog,
    fee_semantics: bool,
) -> Result<(), RpcError> {
    let value: BigDecimal = amount
        .trim()
        .parse()
        .map_err(|_| RpcError::BadRequest(format!("{field}.amount is invalid")))?;

    let zero = BigDecimal::from(0);
    if fee_semantics {
        if value < zero {
            return Err(RpcError::BadRequest(format!(
                "{field}.amount should be non-negative"
            )));
        }
    } else if value <= zero {
        return Err(RpcError::BadRequest(format!(
            "{field}.amount should be positive"
        )));
    }

    let code = asset_code(asset);
    let info = assets
        .get(code)
        .ok_or_else(|| RpcError::BadRequest(format!("{field}.asset is not supported")))?;

    if value.fractional_digit_count() > info.significant_decimals {
        return Err(RpcError::BadRequest(format!(
            "{field}.amount exceeds the allowed decimals for asset [{code}]"
        )));
    }

    Ok(())
}
