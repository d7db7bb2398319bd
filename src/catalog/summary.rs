use crate::engines::serialization::codec::NodeLine;
use crate::engines::serialization::CONNECTIONS_MARKER;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What a saved genome looks like from the outside, read straight from its text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomeSummary {
    /// Rank of each Input node's output shape, in file order
    pub input_dims: Vec<usize>,
    /// Rank of each Output node's input shape, in file order
    pub output_dims: Vec<usize>,
    pub total_nodes: usize,
    /// Sorted, deduplicated node tags
    pub layer_types: Vec<String>,
}

impl GenomeSummary {
    /// Scan the node section of a serialized genome. Lines that do not parse
    /// still count towards `total_nodes` but contribute nothing else.
    pub fn from_serialized(text: &str) -> Self {
        let mut summary = GenomeSummary::default();
        let mut layer_types = BTreeSet::new();

        for row in text.lines().map(str::trim) {
            if row == CONNECTIONS_MARKER {
                break;
            }
            if row.is_empty() {
                continue;
            }
            summary.total_nodes += 1;

            let Ok(line) = serde_json::from_str::<NodeLine>(row) else {
                continue;
            };
            let rank = |key: &str| line.params.get(key).and_then(|v| v.as_array()).map(Vec::len);
            match line.node.as_str() {
                "Input" => summary.input_dims.extend(rank("output_shape")),
                "Output" => summary.output_dims.extend(rank("input_shape")),
                _ => {}
            }
            layer_types.insert(line.node);
        }

        summary.layer_types = layer_types.into_iter().collect();
        summary
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamType {
    Image,
    Vector,
    Categorical,
    Text,
}

impl StreamType {
    /// Tensor rank the stream feeds or expects
    pub fn dims(self) -> usize {
        match self {
            StreamType::Image => 3,
            StreamType::Vector | StreamType::Categorical | StreamType::Text => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamRole {
    Input,
    Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataStream {
    pub role: StreamRole,
    pub stream_type: StreamType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compatibility {
    Compatible,
    Incompatible,
}

/// Inputs pair with `Input` streams and outputs with `Target` streams, in
/// order. Counts and ranks must both match.
pub fn check_stream_compatibility(summary: &GenomeSummary, streams: &[DataStream]) -> Compatibility {
    let ranks = |role: StreamRole| -> Vec<usize> {
        streams
            .iter()
            .filter(|s| s.role == role)
            .map(|s| s.stream_type.dims())
            .collect()
    };

    if summary.input_dims == ranks(StreamRole::Input) && summary.output_dims == ranks(StreamRole::Target) {
        Compatibility::Compatible
    } else {
        Compatibility::Incompatible
    }
}
