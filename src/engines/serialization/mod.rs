//! Line-oriented text encoding of a genome.
//!
//! ```text
//! {"node":"Input","params":{"output_shape":[28,28,1]},"lineage":1}
//! {"node":"Flatten","params":{},"lineage":2}
//! {"node":"Output","params":{"input_shape":[784]},"lineage":3}
//! CONNECTIONS
//! 0 1
//! 1 2
//! ```
//!
//! Nodes are listed breadth-first from the input frontier, following both
//! predecessors and successors, and referenced by their position in that list.

pub mod codec;

use crate::engines::generation::Genome;
use crate::error::{GenomeError, Result};
use crate::graph::GraphBuilder;
use crate::nodes::{LineageCounter, NodeId};
use codec::{encode_node, parse_connection, NodeLine};
use std::collections::HashMap;

pub const CONNECTIONS_MARKER: &str = "CONNECTIONS";

pub fn serialize_genome(genome: &Genome) -> Result<String> {
    let order = genome.reachable();
    let index: HashMap<NodeId, usize> = order.iter().enumerate().map(|(i, &id)| (id, i)).collect();
    let graph = genome.graph();

    let mut output = String::new();
    for &id in &order {
        output.push_str(&encode_node(&graph[id])?);
        output.push('\n');
    }

    output.push_str(CONNECTIONS_MARKER);
    output.push('\n');
    for &id in &order {
        for next in graph[id].successors() {
            if let Some(j) = index.get(next) {
                output.push_str(&format!("{} {}\n", index[&id], j));
            }
        }
    }
    Ok(output)
}

/// Rebuild a genome from its text form. Edges are wired in topological order,
/// so shapes are derived exactly as if the graph had been built by hand.
pub fn deserialize_genome(text: &str, lineage: &LineageCounter) -> Result<Genome> {
    let mut builder = GraphBuilder::new();
    let mut lines = text.lines().enumerate().map(|(i, row)| (i + 1, row.trim()));

    let mut saw_marker = false;
    for (line, row) in lines.by_ref() {
        if row == CONNECTIONS_MARKER {
            saw_marker = true;
            break;
        }
        if row.is_empty() {
            continue;
        }
        let descriptor: NodeLine = serde_json::from_str(row).map_err(|e| GenomeError::Parse {
            line,
            message: e.to_string(),
        })?;
        builder.add(descriptor.into_node(line, lineage)?);
    }
    if !saw_marker {
        return Err(GenomeError::Parse {
            line: text.lines().count(),
            message: format!("missing {} section", CONNECTIONS_MARKER),
        });
    }

    let node_count = builder.len();
    for (line, row) in lines {
        if row.is_empty() {
            continue;
        }
        let (from, to) = parse_connection(row, line)?;
        for index in [from, to] {
            if index >= node_count {
                return Err(GenomeError::UnknownNode(index));
            }
        }
        builder.link(NodeId(from), NodeId(to));
    }

    Ok(Genome::from_graph(builder.build()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::NodeKind;

    #[test]
    fn test_flatten_example_round_trips() {
        let text = "{\"node\":\"Input\",\"params\":{\"output_shape\":[28,28,1]}}\n\
                    {\"node\":\"Flatten\",\"params\":{}}\n\
                    {\"node\":\"Output\",\"params\":{\"input_shape\":[784]}}\n\
                    CONNECTIONS\n0 1\n1 2\n";
        let lineage = LineageCounter::new();
        let genome = deserialize_genome(text, &lineage).unwrap();

        assert!(genome.is_valid());
        assert_eq!(genome.node_count(), 3);
        let output = genome.output_frontier()[0];
        assert_eq!(genome.graph()[output].input_shape(), &[784]);
        assert!(matches!(genome.graph()[NodeId(1)].kind(), NodeKind::Flatten));
    }

    #[test]
    fn test_out_of_range_index() {
        let text = "{\"node\":\"Input\",\"params\":{\"output_shape\":[4]}}\nCONNECTIONS\n0 3\n";
        let err = deserialize_genome(text, &LineageCounter::new()).unwrap_err();
        assert!(matches!(err, GenomeError::UnknownNode(3)));
    }

    #[test]
    fn test_malformed_json_reports_line() {
        let text = "{\"node\":\"Input\",\"params\":{\"output_shape\":[4]}}\n{not json\nCONNECTIONS\n";
        let err = deserialize_genome(text, &LineageCounter::new()).unwrap_err();
        assert!(matches!(err, GenomeError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_missing_marker() {
        let text = "{\"node\":\"Flatten\",\"params\":{}}\n";
        assert!(deserialize_genome(text, &LineageCounter::new()).is_err());
    }
}
