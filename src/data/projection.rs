//! Model-space -> data-space projection.
//!
//! The real projector (surface-to-volume partial-volume weights) is computed
//! by external geometry tooling. Here it is consumed as a sparse weight list:
//! each data voxel receives the weighted sum of the node signals that
//! overlap it, i.e. signals are partial-volume scaled.

use serde::{Deserialize, Serialize};

use crate::domain::{SignalSet, SignalTrace};
use crate::error::AppError;

/// One (voxel, node, weight) triplet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionEntry {
    pub voxel: usize,
    pub node: usize,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projector {
    /// Every node is its own data location with unit weight.
    Identity { n_nodes: usize },
    Sparse {
        n_nodes: usize,
        n_voxels: usize,
        entries: Vec<ProjectionEntry>,
    },
}

impl Projector {
    pub fn sparse(
        n_nodes: usize,
        n_voxels: usize,
        entries: Vec<ProjectionEntry>,
    ) -> Result<Self, AppError> {
        if n_voxels == 0 {
            return Err(AppError::config("Projection must cover at least one voxel."));
        }
        for e in &entries {
            if e.voxel >= n_voxels || e.node >= n_nodes {
                return Err(AppError::config(format!(
                    "Projection entry (voxel {}, node {}) outside {} voxels x {} nodes.",
                    e.voxel, e.node, n_voxels, n_nodes
                )));
            }
            if !(e.weight.is_finite() && e.weight >= 0.0) {
                return Err(AppError::config(format!(
                    "Projection weight for voxel {} node {} must be finite and >= 0.",
                    e.voxel, e.node
                )));
            }
        }
        Ok(Projector::Sparse {
            n_nodes,
            n_voxels,
            entries,
        })
    }

    pub fn n_nodes(&self) -> usize {
        match self {
            Projector::Identity { n_nodes } => *n_nodes,
            Projector::Sparse { n_nodes, .. } => *n_nodes,
        }
    }

    pub fn n_voxels(&self) -> usize {
        match self {
            Projector::Identity { n_nodes } => *n_nodes,
            Projector::Sparse { n_voxels, .. } => *n_voxels,
        }
    }

    /// Project node traces into data space (partial-volume scaled).
    pub fn model_to_data(&self, nodes: &SignalSet) -> Result<SignalSet, AppError> {
        if nodes.n_locations() != self.n_nodes() {
            return Err(AppError::config(format!(
                "Projector expects {} nodes, got {}.",
                self.n_nodes(),
                nodes.n_locations()
            )));
        }
        match self {
            Projector::Identity { .. } => Ok(nodes.clone()),
            Projector::Sparse {
                n_voxels, entries, ..
            } => {
                let n_t = nodes.get(0).map_or(0, SignalTrace::len);
                if nodes.traces().iter().any(|t| t.len() != n_t) {
                    return Err(AppError::config(
                        "Sparse projection needs every node on the same time grid.",
                    ));
                }
                let mut voxels = vec![vec![0.0; n_t]; *n_voxels];
                for e in entries {
                    let src = nodes.traces()[e.node].values();
                    for (dst, &s) in voxels[e.voxel].iter_mut().zip(src) {
                        *dst += e.weight * s;
                    }
                }
                Ok(SignalSet::new(voxels.into_iter().map(SignalTrace::new).collect()))
            }
        }
    }

    /// Weighted mean of a per-node scalar within each voxel.
    ///
    /// Voxels without any node weight get `NaN`.
    pub fn node_values_to_data(&self, values: &[f64]) -> Result<Vec<f64>, AppError> {
        if values.len() != self.n_nodes() {
            return Err(AppError::config(format!(
                "Projector expects {} node values, got {}.",
                self.n_nodes(),
                values.len()
            )));
        }
        match self {
            Projector::Identity { .. } => Ok(values.to_vec()),
            Projector::Sparse {
                n_voxels, entries, ..
            } => {
                let mut sum = vec![0.0; *n_voxels];
                let mut weight = vec![0.0; *n_voxels];
                for e in entries {
                    sum[e.voxel] += e.weight * values[e.node];
                    weight[e.voxel] += e.weight;
                }
                Ok(sum
                    .into_iter()
                    .zip(weight)
                    .map(|(s, w)| if w > 0.0 { s / w } else { f64::NAN })
                    .collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes() -> SignalSet {
        SignalSet::new(vec![
            SignalTrace::new(vec![1.0, 2.0]),
            SignalTrace::new(vec![10.0, 20.0]),
            SignalTrace::new(vec![100.0, 200.0]),
        ])
    }

    #[test]
    fn identity_projection_is_a_copy() {
        let p = Projector::Identity { n_nodes: 3 };
        assert_eq!(p.model_to_data(&nodes()).unwrap(), nodes());
    }

    #[test]
    fn sparse_projection_sums_weighted_nodes() {
        let entries = vec![
            ProjectionEntry { voxel: 0, node: 0, weight: 0.5 },
            ProjectionEntry { voxel: 0, node: 1, weight: 0.5 },
            ProjectionEntry { voxel: 1, node: 2, weight: 1.0 },
        ];
        let p = Projector::sparse(3, 2, entries).unwrap();
        let data = p.model_to_data(&nodes()).unwrap();
        assert_eq!(data.traces()[0].values(), &[5.5, 11.0]);
        assert_eq!(data.traces()[1].values(), &[100.0, 200.0]);

        let means = p.node_values_to_data(&[60.0, 20.0, 30.0]).unwrap();
        assert_eq!(means, vec![40.0, 30.0]);
    }

    #[test]
    fn sparse_projection_rejects_bad_indices() {
        let entries = vec![ProjectionEntry { voxel: 3, node: 0, weight: 1.0 }];
        assert!(Projector::sparse(1, 2, entries).is_err());
    }
}
