// Basic types used throughout vaultgraphs
pub mod types;

// Reading and writing the address, price and vault CSVs
pub mod csv_io;
// Asset price lookups and the AUM calculation
pub mod prices;
// ERC-4626 reads over JSON-RPC, behind the VaultDataSource trait
pub mod onchain;
// Joins on-chain data with prices into vault records
pub mod aggregate;

// Module for building the vault/asset graph from vault records
pub mod graph;
// GraphML export
pub mod graphml;
// Types and functions for summarizing a vault graph
pub mod summary;

// Dune Analytics client for the price and address queries
pub mod dune;
// CLI arguments, environment and logging setup
pub mod config;
// Stage sequencing for the binary
pub mod pipeline;
