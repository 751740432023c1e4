//! Graph Serializer (C10): encodes the optimized PCG for hand-off to the
//! task runtime (`spec.md` §4.8).

use serde::{Deserialize, Serialize};

use crate::catalog::{OpAttrs, OpKind};
use crate::error::SerializeError;
use crate::pcg::{MachineView, Pcg, TensorRef};

/// One operator's serialized form: kind tag, attributes, input references by
/// operator id + slot, and the chosen machine view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedOperator {
    pub kind: OpKind,
    pub attrs: OpAttrs,
    pub inputs: Vec<TensorRef>,
    pub machine_view: Option<MachineView>,
}

/// The full serialized graph. Binary-stable within a single build; no
/// cross-version compatibility requirement (`spec.md` §4.8, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedPcg {
    pub operators: Vec<SerializedOperator>,
}

impl From<&Pcg> for SerializedPcg {
    fn from(pcg: &Pcg) -> Self {
        SerializedPcg {
            operators: pcg
                .operators
                .iter()
                .map(|op| SerializedOperator {
                    kind: op.kind,
                    attrs: op.attrs.clone(),
                    inputs: op.inputs.clone(),
                    machine_view: op.machine_view.clone(),
                })
                .collect(),
        }
    }
}

/// Encode a PCG to a byte buffer via `bincode`.
pub fn encode(pcg: &Pcg) -> Result<Vec<u8>, SerializeError> {
    let serialized = SerializedPcg::from(pcg);
    bincode::serialize(&serialized).map_err(SerializeError::Encode)
}

/// Decode a byte buffer produced by [`encode`] in the same build.
pub fn decode(bytes: &[u8]) -> Result<SerializedPcg, SerializeError> {
    bincode::deserialize(bytes).map_err(SerializeError::Encode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Activation, LinearAttrs};
    use crate::pcg::{Operator, OperatorId};
    use crate::tensor::TensorId;

    #[test]
    fn round_trips_through_bincode() {
        let mut pcg = Pcg::new();
        pcg.push(Operator {
            id: OperatorId(0),
            kind: OpKind::Linear,
            attrs: OpAttrs::Linear(LinearAttrs {
                out_channels: 32,
                activation: Activation::Relu,
                use_bias: true,
            }),
            inputs: vec![],
            needs_gradient: vec![],
            outputs: vec![TensorId(0)],
            weights: vec![],
            machine_view: Some(MachineView::new(vec![4], 0)),
            in_place: false,
        });

        let bytes = encode(&pcg).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.operators.len(), 1);
        assert_eq!(decoded.operators[0].kind, OpKind::Linear);
    }
}
