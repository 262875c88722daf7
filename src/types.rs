use alloy_primitives::{Address, U256};
use petgraph::{Graph, Undirected};
use std::fmt::{Debug, Display};

///
/// VaultGraph
///
/// The graph is an undirected graph where the nodes are vaults and assets, keyed by their address string.
/// Every edge links a vault to the asset it holds. See `VaultNode` and `HoldingEdge`.
///
/// Node indices follow first-seen order, which keeps serialized output stable.
pub type VaultGraph = Graph<VaultNode, HoldingEdge, Undirected>;

///
/// AddressRecord
///
/// A candidate vault address as emitted by the analytics query, with the number of
/// ERC-4626 events observed for it.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    pub contract_address: String,
    pub event_count: u64,
}

impl AddressRecord {
    pub fn new(contract_address: impl Into<String>, event_count: u64) -> Self {
        Self {
            contract_address: contract_address.into(),
            event_count,
        }
    }
}

///
/// VaultData
///
/// Everything read from chain for one vault: its own metadata plus the metadata of
/// the underlying asset resolved through `asset()`.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultData {
    pub vault_symbol: String,
    pub vault_name: String,
    pub asset_address: Address,
    pub asset_symbol: String,
    pub asset_name: String,
    pub asset_decimals: u8,
    pub total_assets_base_units: U256,
}

///
/// VaultRecord
///
/// One row of the intermediate vaults CSV.
///
/// `total_assets_base_units` is kept as a `U256` since vault balances routinely exceed `u64`.
#[derive(Debug, Clone, PartialEq)]
pub struct VaultRecord {
    pub vault_address: String,
    pub vault_symbol: String,
    pub vault_name: String,
    pub asset_address: String,
    pub asset_symbol: String,
    pub asset_name: String,
    pub asset_decimals: u8,
    pub total_assets_base_units: U256,
    pub total_aum_usd_m: f64,
    pub event_count: u64,
}

impl VaultRecord {
    pub fn from_vault_data(record: &AddressRecord, data: VaultData, total_aum_usd_m: f64) -> Self {
        Self {
            // both sides lower-case hex so one address never becomes two nodes
            vault_address: record.contract_address.trim().to_lowercase(),
            vault_symbol: data.vault_symbol,
            vault_name: data.vault_name,
            asset_address: format!("{:#x}", data.asset_address),
            asset_symbol: data.asset_symbol,
            asset_name: data.asset_name,
            asset_decimals: data.asset_decimals,
            total_assets_base_units: data.total_assets_base_units,
            total_aum_usd_m,
            event_count: record.event_count,
        }
    }
}

impl Display for VaultRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "VaultRecord {{ vault: {} ({}), asset: {} ({}), aum_usd_m: {}, events: {} }}",
            self.vault_address,
            self.vault_symbol,
            self.asset_address,
            self.asset_symbol,
            self.total_aum_usd_m,
            self.event_count
        )
    }
}

/// The role an address plays in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Vault,
    Asset,
    /// Both a vault and the underlying asset of another vault.
    Mixed,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Vault => "vault",
            NodeKind::Asset => "asset",
            NodeKind::Mixed => "mixed",
        }
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

///
/// VaultNode
///
/// A vault, asset or mixed node. Identity is `id`, which is always the address string.
///
/// Assets never carry AUM or event counts of their own; those are zero unless the node
/// is also a vault.
#[derive(Debug, Clone, PartialEq)]
pub struct VaultNode {
    pub id: String,
    pub kind: NodeKind,
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub total_aum_usd_m: f64,
    pub event_count: u64,
}

impl VaultNode {
    pub fn vault(record: &VaultRecord) -> Self {
        Self {
            id: record.vault_address.clone(),
            kind: NodeKind::Vault,
            address: record.vault_address.clone(),
            name: record.vault_name.clone(),
            symbol: record.vault_symbol.clone(),
            total_aum_usd_m: record.total_aum_usd_m,
            event_count: record.event_count,
        }
    }

    pub fn asset(record: &VaultRecord) -> Self {
        Self {
            id: record.asset_address.clone(),
            kind: NodeKind::Asset,
            address: record.asset_address.clone(),
            name: record.asset_name.clone(),
            symbol: record.asset_symbol.clone(),
            total_aum_usd_m: 0.0,
            event_count: 0,
        }
    }
}

impl Display for VaultNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "VaultNode {{ id: {}, kind: {}, name: {}, symbol: {} }}",
            self.id, self.kind, self.name, self.symbol
        )
    }
}

///
/// HoldingEdge
///
/// The vault holds the asset. The graph is undirected, so the vault side is recorded
/// explicitly to keep `source`/`target` stable on export.
///
#[derive(Clone, PartialEq, Eq)]
pub struct HoldingEdge {
    pub vault: String,
    pub asset: String,
}

impl Debug for HoldingEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HoldingEdge {{ vault: {}, asset: {} }}", self.vault, self.asset)
    }
}

impl Display for HoldingEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.vault, self.asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn vault_record_lowercases_asset_address() {
        let data = VaultData {
            vault_symbol: "sDAI".to_string(),
            vault_name: "Savings Dai".to_string(),
            asset_address: address!("0x6B175474E89094C44Da98b954EedeAC495271d0F"),
            asset_symbol: "DAI".to_string(),
            asset_name: "Dai Stablecoin".to_string(),
            asset_decimals: 18,
            total_assets_base_units: U256::from(42u64),
        };
        let record = VaultRecord::from_vault_data(
            &AddressRecord::new("0x83f20f44975d03b1b09e64809b757c47f942beea", 7),
            data,
            1.5,
        );

        assert_eq!(
            record.asset_address,
            "0x6b175474e89094c44da98b954eedeac495271d0f"
        );
        assert_eq!(record.vault_address, "0x83f20f44975d03b1b09e64809b757c47f942beea");
        assert_eq!(record.event_count, 7);
        assert_eq!(record.total_aum_usd_m, 1.5);
    }

    #[test]
    fn checksummed_vault_address_matches_asset_spelling() {
        let inner = address!("0xAaAaAAAaA1111111111111111111111111111111");
        let data = VaultData {
            vault_symbol: "outer".to_string(),
            vault_name: "Outer Vault".to_string(),
            asset_address: inner,
            asset_symbol: "inner".to_string(),
            asset_name: "Inner Vault".to_string(),
            asset_decimals: 18,
            total_assets_base_units: U256::ZERO,
        };
        let outer = VaultRecord::from_vault_data(
            &AddressRecord::new("0x3333333333333333333333333333333333333333", 1),
            data.clone(),
            0.0,
        );
        let inner_as_vault = VaultRecord::from_vault_data(
            &AddressRecord::new(" 0xAaAaAAAaA1111111111111111111111111111111", 2),
            data,
            0.0,
        );

        assert_eq!(inner_as_vault.vault_address, outer.asset_address);
        assert_eq!(
            inner_as_vault.vault_address,
            "0xaaaaaaaaa1111111111111111111111111111111"
        );
    }

    #[test]
    fn node_kind_renders_lowercase() {
        assert_eq!(NodeKind::Vault.to_string(), "vault");
        assert_eq!(NodeKind::Asset.to_string(), "asset");
        assert_eq!(NodeKind::Mixed.to_string(), "mixed");
    }
}
