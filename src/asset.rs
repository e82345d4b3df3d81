//! Asset catalog.
//!
//! Read-mostly, process-wide view of the assets the anchor serves. The
//! catalog is swapped atomically on reload so lookups never block.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub code: String,
    /// Number of fractional decimal digits permitted for amounts of this asset.
    pub significant_decimals: i64,
}

pub struct AssetCatalog {
    inner: ArcSwap<HashMap<String, AssetInfo>>,
}

impl AssetCatalog {
    pub fn new(assets: Vec<AssetInfo>) -> Self {
        Self {
            inner: ArcSwap::from_pointee(index(assets)),
        }
    }

    /// Catalog used when no assets file is configured.
    pub fn builtin() -> Self {
        Self::new(vec![
            AssetInfo {
                code: "USDC".to_string(),
                significant_decimals: 7,
            },
            AssetInfo {
                code: "native".to_string(),
                significant_decimals: 7,
            },
            AssetInfo {
                code: "USD".to_string(),
                significant_decimals: 2,
            },
        ])
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let assets: Vec<AssetInfo> = serde_json::from_str(&raw)?;
        Ok(Self::new(assets))
    }

    pub fn get(&self, code: &str) -> Option<AssetInfo> {
        self.inner.load().get(code).cloned()
    }

    pub fn reload(&self, assets: Vec<AssetInfo>) {
        self.inner.store(Arc::new(index(assets)));
    }
}

fn index(assets: Vec<AssetInfo>) -> HashMap<String, AssetInfo> {
    assets
        .into_iter()
        .map(|asset| (asset.code.clone(), asset))
        .collect()
}

/// Extract the asset code from a SEP-38 asset identifier.
/// `stellar:USDC:G...` and `iso4217:USD` yield their code; a bare code
/// passes through unchanged.
pub fn asset_code(asset: &str) -> &str {
    let mut parts = asset.split(':');
    match (parts.next(), parts.next()) {
        (Some(_scheme), Some(code)) => code,
        _ => asset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_code_from_identifiers() {
        assert_eq!(asset_code("stellar:USDC:GABCD"), "USDC");
        assert_eq!(asset_code("iso4217:USD"), "USD");
        assert_eq!(asset_code("stellar:native"), "native");
        assert_eq!(asset_code("USDC"), "USDC");
    }

    #[test]
    fn lookup_and_reload() {
        let catalog = AssetCatalog::builtin();
        assert_eq!(catalog.get("USDC").unwrap().significant_decimals, 7);
        assert!(catalog.get("EUR").is_none());

        catalog.reload(vec![AssetInfo {
            code: "EUR".to_string(),
            significant_decimals: 2,
        }]);
        assert!(catalog.get("USDC").is_none());
        assert_eq!(catalog.get("EUR").unwrap().significant_decimals, 2);
    }
}
