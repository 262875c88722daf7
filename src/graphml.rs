use crate::types::VaultGraph;
use anyhow::{Context, Result};
use std::{
    borrow::Cow,
    fmt::{Display, Write},
    fs,
    path::Path,
};
use tracing::info;

const GRAPHML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<graphml xmlns="http://graphml.graphdrawing.org/xmlns"
    xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
    xsi:schemaLocation="http://graphml.graphdrawing.org/xmlns
     http://graphml.graphdrawing.org/xmlns/1.0/graphml.xsd">
  <key id="type" for="node" attr.name="type" attr.type="string"/>
  <key id="address" for="node" attr.name="address" attr.type="string"/>
  <key id="name" for="node" attr.name="name" attr.type="string"/>
  <key id="symbol" for="node" attr.name="symbol" attr.type="string"/>
  <key id="totalAumUsdMillion" for="node" attr.name="totalAumUsdMillion" attr.type="double"/>
  <key id="eventCount" for="node" attr.name="eventCount" attr.type="double"/>
  <graph id="G" edgedefault="undirected">
"#;

const GRAPHML_FOOTER: &str = "  </graph>\n</graphml>";

/// Escape the five XML special characters. Token names and symbols are arbitrary
/// strings set by whoever deployed the contract.
pub fn escape_xml(raw: &str) -> Cow<'_, str> {
    if !raw.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(raw);
    }

    let mut escaped = String::with_capacity(raw.len() + 8);
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

///
/// GraphMl
///
/// Display adapter rendering a `VaultGraph` as a GraphML document.
///
/// Nodes come out in index order (first-seen order) and edges in insertion order, so the
/// same graph always renders to the same bytes.
pub struct GraphMl<'a>(pub &'a VaultGraph);

impl Display for GraphMl<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let graph = self.0;
        f.write_str(GRAPHML_HEADER)?;

        for node in graph.node_weights() {
            writeln!(f, "    <node id=\"{}\">", escape_xml(&node.id))?;
            writeln!(f, "      <data key=\"type\">{}</data>", node.kind)?;
            writeln!(
                f,
                "      <data key=\"address\">{}</data>",
                escape_xml(&node.address)
            )?;
            writeln!(f, "      <data key=\"name\">{}</data>", escape_xml(&node.name))?;
            writeln!(
                f,
                "      <data key=\"symbol\">{}</data>",
                escape_xml(&node.symbol)
            )?;
            writeln!(
                f,
                "      <data key=\"totalAumUsdMillion\">{}</data>",
                node.total_aum_usd_m
            )?;
            writeln!(f, "      <data key=\"eventCount\">{}</data>", node.event_count)?;
            writeln!(f, "    </node>")?;
        }

        for edge in graph.edge_references() {
            // endpoints of an undirected edge can't be trusted for direction, the weight can
            let holding = edge.weight();
            writeln!(
                f,
                "    <edge source=\"{}\" target=\"{}\"/>",
                escape_xml(&holding.vault),
                escape_xml(&holding.asset)
            )?;
        }

        f.write_str(GRAPHML_FOOTER)
    }
}

/// Write VaultGraph into a GraphML string
///
/// Loads straight into Gephi, yEd or networkx.
pub fn write_graph_to_graphml(graph: &VaultGraph) -> String {
    let mut graphml = String::new();
    // writing into a String only fails if a Display impl lies about it
    let _ = write!(graphml, "{}", GraphMl(graph));
    graphml
}

/// Save VaultGraph as a GraphML file, creating parent directories as needed.
pub fn save_graph_as_graphml(graph: &VaultGraph, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    fs::write(path, write_graph_to_graphml(graph))
        .with_context(|| format!("Failed to write GraphML to {}", path.display()))?;
    info!("File written to {}", path.display());
    Ok(())
}
