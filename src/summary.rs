use crate::types::{NodeKind, VaultGraph};
use std::collections::HashMap;
use std::fmt::Display;

/// How many of the most widely held assets to list.
const TOP_ASSETS: usize = 5;

// TODO: Add per-asset AUM once asset nodes carry prices
#[derive(Debug, Clone, PartialEq)]
pub struct AssetHolders {
    pub address: String,
    pub symbol: String,
    pub no_vaults: usize,
}

impl Display for AssetHolders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.42} ({}) held by {} vaults",
            self.address, self.symbol, self.no_vaults
        )
    }
}

/// GraphSummary
///
/// Headline numbers for a vault graph: node counts per kind, edge count, total AUM and
/// the assets held by the most vaults.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSummary {
    pub no_vaults: usize,
    pub no_assets: usize,
    pub no_mixed: usize,
    pub no_edges: usize,
    pub total_aum_usd_m: f64,
    pub top_assets: Vec<AssetHolders>,
}

impl GraphSummary {
    pub fn from_vault_graph(graph: &VaultGraph) -> Self {
        let mut no_vaults = 0;
        let mut no_assets = 0;
        let mut no_mixed = 0;
        let mut total_aum_usd_m = 0.0;

        for node in graph.node_weights() {
            match node.kind {
                NodeKind::Vault => no_vaults += 1,
                NodeKind::Asset => no_assets += 1,
                NodeKind::Mixed => no_mixed += 1,
            }
            total_aum_usd_m += node.total_aum_usd_m;
        }

        // Accumulate holders per asset, counting each vault once
        let mut acc: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in graph.edge_references() {
            let holding = edge.weight();
            let holders = acc.entry(holding.asset.as_str()).or_default();
            if !holders.contains(&holding.vault.as_str()) {
                holders.push(holding.vault.as_str());
            }
        }

        let mut top_assets: Vec<AssetHolders> = graph
            .node_weights()
            .filter_map(|node| {
                acc.get(node.id.as_str()).map(|holders| AssetHolders {
                    address: node.address.clone(),
                    symbol: node.symbol.clone(),
                    no_vaults: holders.len(),
                })
            })
            .collect();
        // stable sort keeps first-seen order among ties
        top_assets.sort_by(|a, b| b.no_vaults.cmp(&a.no_vaults));
        top_assets.truncate(TOP_ASSETS);

        Self {
            no_vaults,
            no_assets,
            no_mixed,
            no_edges: graph.edge_count(),
            total_aum_usd_m: (total_aum_usd_m * 1_000.0).round() / 1_000.0,
            top_assets,
        }
    }
}

impl Display for GraphSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Vault Graph Summary:")?;
        writeln!(
            f,
            "{} vaults, {} assets, {} mixed, {} edges",
            self.no_vaults, self.no_assets, self.no_mixed, self.no_edges
        )?;
        writeln!(f, "Total AUM: {} USD m", self.total_aum_usd_m)?;
        for asset in &self.top_assets {
            writeln!(f, "  {}", asset)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{graph::build_vault_graph, types::VaultRecord};
    use alloy_primitives::U256;

    fn record(vault: &str, asset: &str, aum: f64) -> VaultRecord {
        VaultRecord {
            vault_address: vault.to_string(),
            vault_symbol: "VLT".to_string(),
            vault_name: "Vault".to_string(),
            asset_address: asset.to_string(),
            asset_symbol: asset.trim_start_matches("0x").to_string(),
            asset_name: "Asset".to_string(),
            asset_decimals: 6,
            total_assets_base_units: U256::ZERO,
            total_aum_usd_m: aum,
            event_count: 1,
        }
    }

    #[test]
    fn counts_kinds_and_ranks_assets() {
        let graph = build_vault_graph(&[
            record("0xV1", "0xUSDC", 1.25),
            record("0xV2", "0xUSDC", 2.5),
            record("0xV3", "0xWETH", 0.25),
            record("0xV4", "0xV1", 1.0),
            record("0xV4", "0xV1", 1.0),
        ]);

        let summary = GraphSummary::from_vault_graph(&graph);

        assert_eq!(summary.no_vaults, 3);
        assert_eq!(summary.no_assets, 2);
        assert_eq!(summary.no_mixed, 1);
        assert_eq!(summary.no_edges, 5);
        assert_eq!(summary.total_aum_usd_m, 5.0);
        assert_eq!(summary.top_assets[0].address, "0xUSDC");
        assert_eq!(summary.top_assets[0].no_vaults, 2);
        // duplicate rows count the vault once
        let v1 = summary
            .top_assets
            .iter()
            .find(|a| a.address == "0xV1")
            .unwrap();
        assert_eq!(v1.no_vaults, 1);
    }

    #[test]
    fn display_lists_counts() {
        let graph = build_vault_graph(&[record("0xV1", "0xUSDC", 1.0)]);
        let text = GraphSummary::from_vault_graph(&graph).to_string();

        assert!(text.contains("1 vaults, 1 assets, 0 mixed, 1 edges"));
        assert!(text.contains("0xUSDC (USDC) held by 1 vaults"));
    }
}
