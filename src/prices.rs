use crate::csv_io::read_csv_as_strings;
use alloy_primitives::{U256, utils::format_units};
use anyhow::{Context, Result};
use polars::prelude::*;
use std::{collections::HashMap, path::Path};
use tracing::{info, warn};

///
/// PriceBook
///
/// USD unit prices keyed by lower-cased asset address. Loaded once per run and read-only
/// afterwards.
///
/// A missing price is not an error: the asset is worth zero for AUM purposes.
#[derive(Debug, Clone, Default)]
pub struct PriceBook {
    prices: HashMap<String, f64>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `contract_address,price` rows. Rows without a price are skipped.
    pub fn load(path: &Path) -> Result<Self> {
        let df = read_csv_as_strings(path)?
            .lazy()
            .filter(
                col("price")
                    .is_not_null()
                    .and(col("contract_address").is_not_null()),
            )
            .collect()
            .with_context(|| format!("Failed to filter prices in {}", path.display()))?;

        let col_address = df.column("contract_address")?.str()?;
        let col_price = df.column("price")?.str()?;

        let mut book = PriceBook::new();
        for row in 0..df.height() {
            let (Some(address), Some(raw_price)) = (col_address.get(row), col_price.get(row))
            else {
                continue;
            };
            match raw_price.trim().parse::<f64>() {
                Ok(price) => book.insert(address, price),
                Err(e) => warn!("Ignoring price {:?} for {}: {}", raw_price, address, e),
            }
        }

        info!("Loaded {} asset prices from {}", book.len(), path.display());
        Ok(book)
    }

    pub fn insert(&mut self, address: &str, price: f64) {
        self.prices.insert(address.trim().to_lowercase(), price);
    }

    /// USD price of one whole unit of `address`, or `0.0` when unpriced.
    pub fn price_of(&self, address: &str) -> f64 {
        self.prices
            .get(&address.trim().to_lowercase())
            .copied()
            .unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl FromIterator<(String, f64)> for PriceBook {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut book = PriceBook::new();
        for (address, price) in iter {
            book.insert(&address, price);
        }
        book
    }
}

/// AUM in millions of USD, rounded to 3 decimal places.
///
/// `total_assets_base_units` is scaled down by `decimals` with arbitrary precision before
/// it is converted to a float.
pub fn aum_usd_million(total_assets_base_units: U256, decimals: u8, price: f64) -> Result<f64> {
    let natural_units: f64 = format_units(total_assets_base_units, decimals)
        .with_context(|| format!("Invalid decimals {}", decimals))?
        .parse()
        .context("Failed to parse formatted units")?;

    let aum = natural_units * price / 1_000_000.0;
    Ok((aum * 1_000.0).round() / 1_000.0)
}
