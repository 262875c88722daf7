use crate::{onchain::VaultDataSource, prices::*, types::*};
use futures::{StreamExt, stream};
use tracing::{info, warn};

/// Fetch on-chain data for every address record and join it with prices.
///
/// Addresses that fail to fetch are logged and skipped; the batch itself never fails.
/// Nothing is retried.
///
/// At most `concurrency` fetches are in flight at once (`0` is treated as `1`). With the
/// default of 1 each fetch completes before the next one starts, which keeps the RPC
/// endpoint load bounded. Output order always matches input order.
pub async fn aggregate_vault_records<D: VaultDataSource + ?Sized>(
    data_source: &D,
    records: &[AddressRecord],
    prices: &PriceBook,
    concurrency: usize,
) -> Vec<VaultRecord> {
    let results: Vec<Option<VaultRecord>> = stream::iter(records)
        .map(|record| async move {
            let data = match data_source.get_vault_data(&record.contract_address).await {
                Ok(data) => data,
                Err(e) => {
                    warn!(
                        "Skipping {} because it is not a readable ERC-4626 vault: {}",
                        record.contract_address, e
                    );
                    return None;
                }
            };

            let price = prices.price_of(&format!("{:#x}", data.asset_address));
            match aum_usd_million(data.total_assets_base_units, data.asset_decimals, price) {
                Ok(aum) => {
                    info!("Processed {}", record.contract_address);
                    Some(VaultRecord::from_vault_data(record, data, aum))
                }
                Err(e) => {
                    warn!("Skipping {} because of error: {:#}", record.contract_address, e);
                    None
                }
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let vault_records: Vec<VaultRecord> = results.into_iter().flatten().collect();
    info!(
        "Aggregated {} vaults, skipped {} of {} addresses",
        vault_records.len(),
        records.len() - vault_records.len(),
        records.len()
    );
    vault_records
}
