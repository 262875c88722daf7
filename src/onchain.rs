//! Read-only ERC-4626 queries over JSON-RPC.
//!
//! Everything here goes through a `VaultDataSource`, so the aggregator can be driven by
//! a live provider or by canned data in tests.

use crate::types::VaultData;
use alloy::primitives::Address;
use alloy::providers::Provider;
use alloy::sol;
use async_trait::async_trait;
use std::str::FromStr;

sol! {
    #[sol(rpc)]
    interface IERC4626 {
        function asset() external view returns (address);
        function symbol() external view returns (string);
        function name() external view returns (string);
        function totalAssets() external view returns (uint256);
    }

    #[sol(rpc)]
    interface IERC20Metadata {
        function symbol() external view returns (string);
        function name() external view returns (string);
        function decimals() external view returns (uint8);
    }
}

/// Why a vault could not be read. Any of these means "not a usable ERC-4626 vault".
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Contract error: {0}")]
    Contract(#[from] alloy::contract::Error),
}

///
/// VaultDataSource
///
/// A generic trait across sources of vault metadata.
///
/// Implementations must not panic on bad input; every failure is reported as a `FetchError`
/// so the caller can skip the address and move on.
#[async_trait]
pub trait VaultDataSource: Send + Sync {
    async fn get_vault_data(&self, vault_address: &str) -> Result<VaultData, FetchError>;
}

/// RpcVaultDataSource reads vault and asset metadata with `eth_call`s against any alloy provider.
#[derive(Debug, Clone)]
pub struct RpcVaultDataSource<P> {
    provider: P,
}

impl<P: Provider> RpcVaultDataSource<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

#[async_trait]
impl<P: Provider> VaultDataSource for RpcVaultDataSource<P> {
    async fn get_vault_data(&self, vault_address: &str) -> Result<VaultData, FetchError> {
        let address = Address::from_str(vault_address.trim())
            .map_err(|_| FetchError::InvalidAddress(vault_address.to_string()))?;

        let vault: IERC4626::IERC4626Instance<&P> = IERC4626::new(address, &self.provider);
        // The asset has to be known before its metadata can be queried
        let asset_address = vault.asset().call().await?;
        let asset: IERC20Metadata::IERC20MetadataInstance<&P> =
            IERC20Metadata::new(asset_address, &self.provider);

        let vault_symbol = vault.symbol();
        let vault_name = vault.name();
        let total_assets = vault.totalAssets();
        let asset_symbol = asset.symbol();
        let asset_name = asset.name();
        let asset_decimals = asset.decimals();

        let (
            vault_symbol,
            vault_name,
            asset_symbol,
            asset_name,
            asset_decimals,
            total_assets_base_units,
        ) = tokio::try_join!(
            vault_symbol.call().into_future(),
            vault_name.call().into_future(),
            asset_symbol.call().into_future(),
            asset_name.call().into_future(),
            asset_decimals.call().into_future(),
            total_assets.call().into_future(),
        )?;

        Ok(VaultData {
            vault_symbol,
            vault_name,
            asset_address,
            asset_symbol,
            asset_name,
            asset_decimals,
            total_assets_base_units,
        })
    }
}

/// Latest block number, used as a cheap check that the RPC endpoint answers.
pub async fn latest_block<P: Provider>(provider: &P) -> anyhow::Result<u64> {
    Ok(provider.get_block_number().await?)
}
