use crate::types::*;
use petgraph::graph::NodeIndex;
use std::collections::HashMap;

/// Build the vault/asset graph from vault records, in record order.
///
/// Per record:
/// 1. the vault gets a `vault` node carrying the record's AUM and event count, unless the
///    address is already known;
/// 2. the asset gets an `asset` node with zero metrics, unless already known;
/// 3. an edge vault -> asset is added unconditionally, so repeated pairs and self-loops
///    show up as they are.
///
/// An address seen both as a vault and as an asset ends up `mixed`, whichever role came first.
pub fn build_vault_graph(records: &[VaultRecord]) -> VaultGraph {
    let mut graph = VaultGraph::default();
    // one node per address; edges look up both ends here
    let mut addr_idx_map: HashMap<String, NodeIndex> = HashMap::new();

    for record in records {
        let vault_idx = match addr_idx_map.get(&record.vault_address) {
            Some(&idx) => {
                let node = &mut graph[idx];
                if node.kind == NodeKind::Asset {
                    // assets carry no metrics, the vault's are the only ones this node will have
                    node.kind = NodeKind::Mixed;
                    node.total_aum_usd_m = record.total_aum_usd_m;
                    node.event_count = record.event_count;
                }
                idx
            }
            None => {
                let idx = graph.add_node(VaultNode::vault(record));
                addr_idx_map.insert(record.vault_address.clone(), idx);
                idx
            }
        };

        // An already known vault becomes mixed. Otherwise `.entry().or_insert_with()` adds
        // the asset node and records its index in one go.
        let asset_idx = match addr_idx_map.get(&record.asset_address) {
            Some(&idx) => {
                if graph[idx].kind == NodeKind::Vault {
                    graph[idx].kind = NodeKind::Mixed;
                }
                idx
            }
            None => *addr_idx_map
                .entry(record.asset_address.clone())
                .or_insert_with(|| graph.add_node(VaultNode::asset(record))),
        };

        graph.add_edge(
            vault_idx,
            asset_idx,
            HoldingEdge {
                vault: record.vault_address.clone(),
                asset: record.asset_address.clone(),
            },
        );
    }

    graph
}

/// Find a node by its address.
pub fn find_node<'a>(graph: &'a VaultGraph, address: &str) -> Option<&'a VaultNode> {
    graph
        .node_indices()
        .map(|idx| &graph[idx])
        .find(|node| node.id == address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    fn record(vault: &str, asset: &str, aum: f64, events: u64) -> VaultRecord {
        VaultRecord {
            vault_address: vault.to_string(),
            vault_symbol: format!("{}-sym", vault),
            vault_name: format!("{} name", vault),
            asset_address: asset.to_string(),
            asset_symbol: format!("{}-sym", asset),
            asset_name: format!("{} name", asset),
            asset_decimals: 18,
            total_assets_base_units: U256::ZERO,
            total_aum_usd_m: aum,
            event_count: events,
        }
    }

    #[test]
    fn two_independent_vaults() {
        let graph = build_vault_graph(&[
            record("0xVault1", "0xAsset1", 100.0, 10),
            record("0xVault2", "0xAsset2", 200.0, 20),
        ]);

        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 2);

        let ids: Vec<_> = graph.node_weights().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["0xVault1", "0xAsset1", "0xVault2", "0xAsset2"]);

        let vault = find_node(&graph, "0xVault1").unwrap();
        assert_eq!(vault.kind, NodeKind::Vault);
        assert_eq!(vault.total_aum_usd_m, 100.0);
        assert_eq!(vault.event_count, 10);

        let asset = find_node(&graph, "0xAsset1").unwrap();
        assert_eq!(asset.kind, NodeKind::Asset);
        assert_eq!(asset.total_aum_usd_m, 0.0);
        assert_eq!(asset.event_count, 0);
    }

    #[test]
    fn vault_that_is_later_an_asset_becomes_mixed() {
        let graph = build_vault_graph(&[
            record("0xV1", "0xA1", 1.0, 1),
            record("0xV2", "0xV1", 2.0, 2),
        ]);

        assert_eq!(graph.node_count(), 3);
        let v1 = find_node(&graph, "0xV1").unwrap();
        assert_eq!(v1.kind, NodeKind::Mixed);
        assert_eq!(v1.total_aum_usd_m, 1.0);
    }

    #[test]
    fn asset_that_is_later_a_vault_becomes_mixed() {
        let graph = build_vault_graph(&[
            record("0xV1", "0xA1", 1.0, 1),
            record("0xA1", "0xX", 3.5, 7),
        ]);

        assert_eq!(graph.node_count(), 3);
        let a1 = find_node(&graph, "0xA1").unwrap();
        assert_eq!(a1.kind, NodeKind::Mixed);
        assert_eq!(a1.total_aum_usd_m, 3.5);
        assert_eq!(a1.event_count, 7);
        // name and symbol stay as first seen
        assert_eq!(a1.name, "0xA1 name");
        assert_eq!(find_node(&graph, "0xX").unwrap().kind, NodeKind::Asset);
    }

    #[test]
    fn shared_asset_is_one_node_with_many_edges() {
        let graph = build_vault_graph(&[
            record("0xV1", "0xUSDC", 1.0, 1),
            record("0xV2", "0xUSDC", 2.0, 2),
            record("0xV3", "0xUSDC", 3.0, 3),
        ]);

        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(find_node(&graph, "0xUSDC").unwrap().kind, NodeKind::Asset);
    }

    #[test]
    fn duplicate_rows_keep_duplicate_edges() {
        let graph = build_vault_graph(&[
            record("0xV1", "0xA1", 1.0, 1),
            record("0xV1", "0xA1", 9.0, 9),
        ]);

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 2);
        // first sighting wins
        assert_eq!(find_node(&graph, "0xV1").unwrap().total_aum_usd_m, 1.0);
    }

    #[test]
    fn vault_holding_itself_is_a_self_loop() {
        let graph = build_vault_graph(&[record("0xV1", "0xV1", 1.0, 1)]);

        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(find_node(&graph, "0xV1").unwrap().kind, NodeKind::Mixed);
    }

    #[test]
    fn empty_input_gives_empty_graph() {
        let graph = build_vault_graph(&[]);
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
    }
}
