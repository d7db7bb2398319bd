use crate::error::{GenomeError, Result};
use crate::nodes::{Conv2DParams, DenseParams, LineageCounter, LineageId, Node, NodeKind, PoolingParams};
use crate::types::Shape;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One node descriptor line as read back from text
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NodeLine {
    pub node: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub lineage: Option<u64>,
}

#[derive(Serialize, Deserialize)]
struct InputParams {
    output_shape: Shape,
}

#[derive(Serialize, Deserialize)]
struct OutputParams {
    input_shape: Shape,
}

#[derive(Serialize)]
struct NoParams {}

#[derive(Serialize)]
#[serde(untagged)]
enum ParamsRef<'a> {
    Input(InputParams),
    Output(OutputParams),
    Dense(&'a DenseParams),
    Conv2D(&'a Conv2DParams),
    Pooling(&'a PoolingParams),
    Empty(NoParams),
}

#[derive(Serialize)]
struct NodeLineRef<'a> {
    node: &'static str,
    params: ParamsRef<'a>,
    /// Not read by the training backend; keeps homology across save and load
    #[serde(skip_serializing_if = "Option::is_none")]
    lineage: Option<u64>,
}

/// Descriptor line for one node, parameters in declaration order
pub fn encode_node(node: &Node) -> Result<String> {
    let params = match node.kind() {
        NodeKind::Input { shape } => ParamsRef::Input(InputParams { output_shape: shape.clone() }),
        NodeKind::Output => ParamsRef::Output(OutputParams {
            input_shape: node.input_shape().to_vec(),
        }),
        NodeKind::Dense(p) => ParamsRef::Dense(p),
        NodeKind::Conv2D(p) => ParamsRef::Conv2D(p),
        NodeKind::Pooling(p) => ParamsRef::Pooling(p),
        NodeKind::Flatten | NodeKind::Add | NodeKind::Concat => ParamsRef::Empty(NoParams {}),
    };
    let line = NodeLineRef {
        node: node.tag(),
        params,
        lineage: Some(node.lineage_id().0),
    };
    Ok(serde_json::to_string(&line)?)
}

impl NodeLine {
    /// Build the described node. Fresh nodes draw from `lineage`; a persisted
    /// lineage id overrides that and is reported to the counter.
    pub fn into_node(self, line: usize, lineage: &LineageCounter) -> Result<Node> {
        let bad_params = |e: serde_json::Error| GenomeError::Parse {
            line,
            message: format!("invalid {} params: {}", self.node, e),
        };

        let node = match self.node.as_str() {
            "Input" => {
                let p: InputParams = serde_json::from_value(self.params.clone()).map_err(bad_params)?;
                Node::input(p.output_shape, lineage)
            }
            "Output" => {
                let p: OutputParams = serde_json::from_value(self.params.clone()).map_err(bad_params)?;
                Node::output(p.input_shape, lineage)
            }
            "Dense" => {
                let p: DenseParams = serde_json::from_value(self.params.clone()).map_err(bad_params)?;
                Node::new(NodeKind::Dense(p), lineage)
            }
            "Conv2D" => {
                let p: Conv2DParams = serde_json::from_value(self.params.clone()).map_err(bad_params)?;
                Node::new(NodeKind::Conv2D(p), lineage)
            }
            "Pooling" => {
                let p: PoolingParams = serde_json::from_value(self.params.clone()).map_err(bad_params)?;
                Node::new(NodeKind::Pooling(p), lineage)
            }
            "Flatten" => Node::new(NodeKind::Flatten, lineage),
            "Add" => Node::new(NodeKind::Add, lineage),
            "Concat" => Node::new(NodeKind::Concat, lineage),
            other => {
                return Err(GenomeError::Parse {
                    line,
                    message: format!("unknown node type {:?}", other),
                })
            }
        };

        Ok(match self.lineage {
            Some(id) => {
                let id = LineageId(id);
                lineage.observe(id);
                node.with_lineage(id)
            }
            None => node,
        })
    }
}

/// Parse a `from to` connection row
pub fn parse_connection(row: &str, line: usize) -> Result<(usize, usize)> {
    let parts: Vec<&str> = row.split_whitespace().collect();
    let [from, to] = parts.as_slice() else {
        return Err(GenomeError::Parse {
            line,
            message: format!("expected two indices, got {:?}", row),
        });
    };
    let index = |s: &str| {
        s.parse::<usize>().map_err(|e| GenomeError::Parse {
            line,
            message: format!("bad node index {:?}: {}", s, e),
        })
    };
    Ok((index(*from)?, index(*to)?))
}
