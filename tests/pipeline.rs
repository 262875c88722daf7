use alloy_primitives::{Address, U256, address};
use async_trait::async_trait;
use std::{collections::HashMap, fs};
use vaultgraphs::{
    csv_io::read_vault_records,
    graph::find_node,
    onchain::{FetchError, VaultDataSource},
    pipeline::{aggregate_to_csv, run_graph_stage},
    types::{NodeKind, VaultData},
};

const VAULTS_CSV: &str = "vault_address,vault_symbol,vault_name,asset_address,asset_symbol,asset_name,total_aum_usd_m,event_count
    0xVault1,VLT1,Vault One,0xAsset1,AST1,Asset One,100,10
    0xVault2,VLT2,Vault Two,0xAsset2,AST2,Asset Two,200,20";

#[test]
fn two_vault_sample_produces_four_nodes_and_two_edges() {
    let dir = tempfile::tempdir().unwrap();
    let vaults = dir.path().join("vaults-test.csv");
    let output = dir.path().join("output-test.graphml");
    fs::write(&vaults, VAULTS_CSV).unwrap();

    run_graph_stage(&vaults, &output).unwrap();

    let graphml = fs::read_to_string(&output).unwrap();
    assert!(graphml.contains("<graphml"));
    assert_eq!(graphml.matches("<node id=").count(), 4);
    assert_eq!(graphml.matches("<edge ").count(), 2);
    for id in ["0xVault1", "0xAsset1", "0xVault2", "0xAsset2"] {
        assert!(graphml.contains(&format!("<node id=\"{}\">", id)));
    }
    for name in ["Vault One", "Vault Two", "Asset One", "Asset Two"] {
        assert!(graphml.contains(name));
    }
}

#[test]
fn rebuilding_the_graph_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let vaults = dir.path().join("vaults.csv");
    fs::write(
        &vaults,
        "vault_address,vault_symbol,vault_name,asset_address,asset_symbol,asset_name,total_aum_usd_m,event_count\n\
         0xV1,V1,Vault 1,0xA1,A1,Asset 1,1.5,1\n\
         0xA1,A1,Asset 1,0xX,X,Base,2.25,2\n\
         0xV3,V3,Vault 3,0xA1,A1,Asset 1,0,3\n",
    )
    .unwrap();

    let first = dir.path().join("first.graphml");
    let second = dir.path().join("second.graphml");
    let graph = run_graph_stage(&vaults, &first).unwrap();
    run_graph_stage(&vaults, &second).unwrap();

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    assert_eq!(find_node(&graph, "0xA1").unwrap().kind, NodeKind::Mixed);
}

#[test]
fn missing_vaults_csv_aborts_the_stage() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_graph_stage(&dir.path().join("nope.csv"), &dir.path().join("out.graphml"));
    assert!(result.is_err());
    assert!(!dir.path().join("out.graphml").exists());
}

struct FixedVaults(HashMap<&'static str, VaultData>);

#[async_trait]
impl VaultDataSource for FixedVaults {
    async fn get_vault_data(&self, vault_address: &str) -> Result<VaultData, FetchError> {
        self.0
            .get(vault_address)
            .cloned()
            .ok_or_else(|| FetchError::InvalidAddress(vault_address.to_string()))
    }
}

fn vault_data(symbol: &str, asset: Address, decimals: u8, total: u128) -> VaultData {
    VaultData {
        vault_symbol: symbol.to_string(),
        vault_name: format!("{} Vault", symbol),
        asset_address: asset,
        asset_symbol: "AST".to_string(),
        asset_name: "Asset".to_string(),
        asset_decimals: decimals,
        total_assets_base_units: U256::from(total),
    }
}

#[tokio::test]
async fn addresses_to_graph_without_a_network() {
    let usdc = address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
    let inner = address!("0x1111111111111111111111111111111111111111");
    let unpriced = address!("0x2222222222222222222222222222222222222222");

    let source = FixedVaults(HashMap::from([
        (
            "0x1111111111111111111111111111111111111111",
            vault_data("inner", usdc, 6, 5_000_000_000_000),
        ),
        (
            "0x3333333333333333333333333333333333333333",
            vault_data("outer", inner, 18, 1_000_000_000_000_000_000),
        ),
        (
            "0x4444444444444444444444444444444444444444",
            vault_data("odd", unpriced, 6, 1_000_000),
        ),
    ]));

    let dir = tempfile::tempdir().unwrap();
    let addresses = dir.path().join("in").join("addresses-sample.csv");
    let prices = dir.path().join("reference").join("asset-prices.csv");
    let vaults = dir.path().join("process").join("vaults-sample.csv");
    let output = dir.path().join("out").join("output-sample.graphml");
    fs::create_dir_all(addresses.parent().unwrap()).unwrap();
    fs::create_dir_all(prices.parent().unwrap()).unwrap();
    fs::write(
        &addresses,
        "contract_address,event_count\n\
         0x1111111111111111111111111111111111111111,10\n\
         0xInvalidVaultAddress,99\n\
         0x3333333333333333333333333333333333333333,30\n\
         0x4444444444444444444444444444444444444444,40\n",
    )
    .unwrap();
    fs::write(
        &prices,
        "contract_address,price\n0xA0B86991C6218B36C1D19D4A2E9EB0CE3606EB48,1.0\n",
    )
    .unwrap();

    let written = aggregate_to_csv(&source, &addresses, &prices, &vaults, 1)
        .await
        .unwrap();
    assert_eq!(written, 3);

    let records = read_vault_records(&vaults).unwrap();
    assert_eq!(records[0].total_aum_usd_m, 5.0);
    assert_eq!(records[0].asset_decimals, 6);
    assert_eq!(records[0].total_assets_base_units, U256::from(5_000_000_000_000u64));
    assert_eq!(records[2].total_aum_usd_m, 0.0);

    let graph = run_graph_stage(&vaults, &output).unwrap();

    // the inner vault is also the outer vault's asset
    let inner_node = find_node(&graph, "0x1111111111111111111111111111111111111111").unwrap();
    assert_eq!(inner_node.kind, NodeKind::Mixed);
    assert_eq!(inner_node.total_aum_usd_m, 5.0);
    assert_eq!(graph.node_count(), 5);
    assert_eq!(graph.edge_count(), 3);
    assert!(fs::read_to_string(&output).unwrap().contains("outer Vault"));
}
