//! The three pipeline stages, run in order: download reference data, fetch and aggregate
//! vault data, build the graph. Any stage error aborts the run.

use crate::{
    aggregate::aggregate_vault_records,
    config::{Config, Mode},
    csv_io::{read_address_records, read_vault_records, write_vault_records},
    dune::{DuneClient, QueryOptions},
    graph::build_vault_graph,
    graphml::save_graph_as_graphml,
    onchain::{RpcVaultDataSource, VaultDataSource, latest_block},
    prices::PriceBook,
    summary::GraphSummary,
    types::VaultGraph,
};
use alloy::providers::ProviderBuilder;
use anyhow::{Context, Result, anyhow};
use std::path::Path;
use tracing::info;

/// Stage 1: download asset prices, and in full mode the candidate address list.
pub async fn fetch_reference_data(config: &Config) -> Result<()> {
    if config.skip_download {
        info!("Skipping downloads, using files already on disk");
        return Ok(());
    }

    let api_key = config
        .dune_api_key
        .as_deref()
        .ok_or_else(|| anyhow!("DUNE_API_KEY is not set"))?;
    let dune = DuneClient::new(api_key)?;
    let opts = QueryOptions::default();

    info!("Downloading asset prices (query {})", config.prices_query_id);
    dune.download_csv(config.prices_query_id, &config.files.prices, &opts)
        .await
        .context("Failed to download asset prices")?;

    match config.mode {
        Mode::Sample => info!("Sample mode, keeping curated {}", config.files.addresses.display()),
        Mode::Full => {
            let query_id = config
                .addresses_query_id
                .ok_or_else(|| anyhow!("DUNE_QUERY_ADDRESSES is not set"))?;
            info!("Downloading vault addresses (query {})", query_id);
            dune.download_csv(query_id, &config.files.addresses, &opts)
                .await
                .context("Failed to download vault addresses")?;
        }
    }

    Ok(())
}

/// Read addresses and prices, fetch every vault through `data_source`, write the vaults CSV.
pub async fn aggregate_to_csv<D: VaultDataSource + ?Sized>(
    data_source: &D,
    addresses_path: &Path,
    prices_path: &Path,
    vaults_path: &Path,
    concurrency: usize,
) -> Result<usize> {
    let address_records = read_address_records(addresses_path)?;
    let prices = PriceBook::load(prices_path)?;

    let vault_records =
        aggregate_vault_records(data_source, &address_records, &prices, concurrency).await;
    write_vault_records(vaults_path, &vault_records)?;

    Ok(vault_records.len())
}

/// Stage 2: on-chain fetch and aggregation over the configured RPC endpoint.
pub async fn fetch_vault_data(config: &Config) -> Result<()> {
    let data_source =
        RpcVaultDataSource::new(ProviderBuilder::new().connect_http(config.rpc_url.clone()));
    let block = latest_block(data_source.provider())
        .await
        .context("RPC endpoint did not answer")?;
    info!("Connected to RPC, latest block {}", block);

    let written = aggregate_to_csv(
        &data_source,
        &config.files.addresses,
        &config.files.prices,
        &config.files.vaults,
        config.concurrency,
    )
    .await?;
    info!("Wrote {} vault records", written);

    Ok(())
}

/// Stage 3: vaults CSV to GraphML. Usable on its own to rebuild a graph from an existing CSV.
pub fn run_graph_stage(vaults_path: &Path, output_path: &Path) -> Result<VaultGraph> {
    let vault_records = read_vault_records(vaults_path)?;
    let graph = build_vault_graph(&vault_records);
    info!(
        "Graph has {} nodes and {} edges",
        graph.node_count(),
        graph.edge_count()
    );
    save_graph_as_graphml(&graph, output_path)?;
    Ok(graph)
}

pub async fn run(config: &Config) -> Result<()> {
    info!("Running in {} mode...", config.mode);

    fetch_reference_data(config)
        .await
        .context("Reference data stage failed")?;
    fetch_vault_data(config)
        .await
        .context("Vault data stage failed")?;
    let graph = run_graph_stage(&config.files.vaults, &config.files.output)
        .context("Graph stage failed")?;

    info!("{}", GraphSummary::from_vault_graph(&graph));
    info!("All steps completed.");
    Ok(())
}
