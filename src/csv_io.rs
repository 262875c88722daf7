use crate::types::*;
use alloy_primitives::U256;
use anyhow::{Context, Result};
use polars::prelude::*;
use std::{fs, fs::File, path::Path, str::FromStr};
use tracing::info;

/// Column order of the intermediate vaults CSV.
pub const VAULT_COLUMNS: [&str; 10] = [
    "vault_address",
    "vault_symbol",
    "vault_name",
    "asset_address",
    "asset_symbol",
    "asset_name",
    "asset_decimals",
    "total_assets_base_units",
    "total_aum_usd_m",
    "event_count",
];

/// Load a CSV with every column read as a string.
///
/// Type inference is switched off on purpose: token amounts don't fit the default i64,
/// and addresses must never be mangled. Each reader parses the columns it needs.
pub fn read_csv_as_strings(path: &Path) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .with_context(|| format!("Failed to open {}", path.display()))?
        .finish()
        .with_context(|| format!("Failed to parse CSV {}", path.display()))
}

fn string_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a StringChunked> {
    df.column(name)
        .with_context(|| format!("Missing column `{}`", name))?
        .str()
        .with_context(|| format!("Column `{}` is not a string column", name))
}

fn optional_string_column<'a>(df: &'a DataFrame, name: &str) -> Result<Option<&'a StringChunked>> {
    match df.column(name) {
        Ok(column) => Ok(Some(column.str()?)),
        Err(_) => Ok(None),
    }
}

fn cell<'a>(column: &'a StringChunked, row: usize) -> &'a str {
    column.get(row).map(str::trim).unwrap_or_default()
}

fn parse_cell<T>(column: &StringChunked, row: usize, name: &str) -> Result<T>
where
    T: FromStr + Default,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = cell(column, row);
    if raw.is_empty() {
        return Ok(T::default());
    }
    raw.parse::<T>()
        .with_context(|| format!("Failed to parse `{}` value {:?} on row {}", name, raw, row))
}

/// Counts in analytics exports sometimes come back as floats ("12.0").
fn parse_count(column: &StringChunked, row: usize, name: &str) -> Result<u64> {
    let raw = cell(column, row);
    if raw.is_empty() {
        return Ok(0);
    }
    if let Ok(count) = raw.parse::<u64>() {
        return Ok(count);
    }
    let as_float = raw
        .parse::<f64>()
        .with_context(|| format!("Failed to parse `{}` value {:?} on row {}", name, raw, row))?;
    Ok(as_float.max(0.0) as u64)
}

/// Read the seed list of candidate vaults (`contract_address`, `event_count`).
pub fn read_address_records(path: &Path) -> Result<Vec<AddressRecord>> {
    let df = read_csv_as_strings(path)?;

    let col_address = string_column(&df, "contract_address")?;
    let col_event_count = string_column(&df, "event_count")?;

    let mut records = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let address = cell(col_address, row);
        if address.is_empty() {
            continue;
        }
        records.push(AddressRecord::new(
            address,
            parse_count(col_event_count, row, "event_count")?,
        ));
    }

    info!("Read {} address records from {}", records.len(), path.display());
    Ok(records)
}

/// Read the intermediate vaults CSV.
///
/// `asset_decimals` and `total_assets_base_units` may be absent (older exports did not
/// carry them) and default to zero.
pub fn read_vault_records(path: &Path) -> Result<Vec<VaultRecord>> {
    let df = read_csv_as_strings(path)?;

    let col_vault_address = string_column(&df, "vault_address")?;
    let col_vault_symbol = string_column(&df, "vault_symbol")?;
    let col_vault_name = string_column(&df, "vault_name")?;
    let col_asset_address = string_column(&df, "asset_address")?;
    let col_asset_symbol = string_column(&df, "asset_symbol")?;
    let col_asset_name = string_column(&df, "asset_name")?;
    let col_asset_decimals = optional_string_column(&df, "asset_decimals")?;
    let col_total_assets = optional_string_column(&df, "total_assets_base_units")?;
    let col_aum = string_column(&df, "total_aum_usd_m")?;
    let col_event_count = string_column(&df, "event_count")?;

    let mut records = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let asset_decimals = match col_asset_decimals {
            Some(col) => parse_cell::<u8>(col, row, "asset_decimals")?,
            None => 0,
        };
        let total_assets_base_units = match col_total_assets {
            Some(col) => parse_cell::<U256>(col, row, "total_assets_base_units")?,
            None => U256::ZERO,
        };

        records.push(VaultRecord {
            vault_address: cell(col_vault_address, row).to_string(),
            vault_symbol: cell(col_vault_symbol, row).to_string(),
            vault_name: cell(col_vault_name, row).to_string(),
            asset_address: cell(col_asset_address, row).to_string(),
            asset_symbol: cell(col_asset_symbol, row).to_string(),
            asset_name: cell(col_asset_name, row).to_string(),
            asset_decimals,
            total_assets_base_units,
            total_aum_usd_m: parse_cell::<f64>(col_aum, row, "total_aum_usd_m")?,
            event_count: parse_count(col_event_count, row, "event_count")?,
        });
    }

    info!("Read {} vault records from {}", records.len(), path.display());
    Ok(records)
}

/// Turn vault records into a DataFrame with the columns in `VAULT_COLUMNS` order.
pub fn vault_records_to_frame(records: &[VaultRecord]) -> Result<DataFrame> {
    let column = |name: &str, values: Vec<String>| Column::new(name.into(), values);

    let df = DataFrame::new(vec![
        column(
            VAULT_COLUMNS[0],
            records.iter().map(|r| r.vault_address.clone()).collect(),
        ),
        column(
            VAULT_COLUMNS[1],
            records.iter().map(|r| r.vault_symbol.clone()).collect(),
        ),
        column(
            VAULT_COLUMNS[2],
            records.iter().map(|r| r.vault_name.clone()).collect(),
        ),
        column(
            VAULT_COLUMNS[3],
            records.iter().map(|r| r.asset_address.clone()).collect(),
        ),
        column(
            VAULT_COLUMNS[4],
            records.iter().map(|r| r.asset_symbol.clone()).collect(),
        ),
        column(
            VAULT_COLUMNS[5],
            records.iter().map(|r| r.asset_name.clone()).collect(),
        ),
        Column::new(
            VAULT_COLUMNS[6].into(),
            records
                .iter()
                .map(|r| u32::from(r.asset_decimals))
                .collect::<Vec<u32>>(),
        ),
        // arbitrary precision, so it goes out as a decimal string
        column(
            VAULT_COLUMNS[7],
            records
                .iter()
                .map(|r| r.total_assets_base_units.to_string())
                .collect(),
        ),
        Column::new(
            VAULT_COLUMNS[8].into(),
            records
                .iter()
                .map(|r| r.total_aum_usd_m)
                .collect::<Vec<f64>>(),
        ),
        Column::new(
            VAULT_COLUMNS[9].into(),
            records.iter().map(|r| r.event_count).collect::<Vec<u64>>(),
        ),
    ])?;

    Ok(df)
}

/// Write the intermediate vaults CSV. The header is written even with no rows.
pub fn write_vault_records(path: &Path, records: &[VaultRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let mut df = vault_records_to_frame(records)?;
    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)
        .with_context(|| format!("Failed to write CSV {}", path.display()))?;

    info!("File written to {}", path.display());
    Ok(())
}
