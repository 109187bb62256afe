//! Acquisition geometry for the hybrid (surface + volume) flow.
//!
//! Surface and volume files (GIFTI/NIfTI/projector HDF5) are never decoded by
//! this crate. External tooling resolves them into a small JSON document:
//!
//! ```json
//! {
//!   "volume_shape": [nx, ny, nz],
//!   "world_to_voxel": [[1,0,0,0],[0,1,0,0],[0,0,1,0],[0,0,0,1]],
//!   "cortex": { "name": "L", "vertices": [[x, y, z], ...] },
//!   "white_matter": { "name": "WM", "size": 1234 },
//!   "projection": { "n_voxels": 4000, "entries": [{"voxel": 0, "node": 5, "weight": 0.3}] }
//! }
//! ```
//!
//! `world_to_voxel` and `projection` are optional (identity when absent).
//! Cortex vertices are the inflated-surface coordinates in world space.

use std::f64::consts::PI;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

use crate::data::projection::{ProjectionEntry, Projector};
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceNodes {
    pub name: String,
    pub vertices: Vec<[f64; 3]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeRegion {
    pub name: String,
    pub size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionFile {
    pub n_voxels: usize,
    pub entries: Vec<ProjectionEntry>,
}

/// On-disk geometry document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryFile {
    pub volume_shape: [usize; 3],
    #[serde(default)]
    pub world_to_voxel: Option<[[f64; 4]; 4]>,
    pub cortex: SurfaceNodes,
    pub white_matter: VolumeRegion,
    #[serde(default)]
    pub projection: Option<ProjectionFile>,
}

/// Validated geometry.
#[derive(Debug, Clone)]
pub struct Geometry {
    pub volume_shape: [usize; 3],
    pub world_to_voxel: Matrix4<f64>,
    pub cortex: SurfaceNodes,
    pub white_matter: VolumeRegion,
    pub projector: Projector,
}

impl Geometry {
    pub fn from_file_model(file: GeometryFile) -> Result<Self, AppError> {
        if file.volume_shape.iter().any(|&n| n == 0) {
            return Err(AppError::config(format!(
                "Geometry volume shape must be non-empty, got {:?}.",
                file.volume_shape
            )));
        }
        if file.cortex.vertices.is_empty() {
            return Err(AppError::config(format!(
                "Cortical surface '{}' has no vertices.",
                file.cortex.name
            )));
        }
        if file.cortex.vertices.iter().flatten().any(|c| !c.is_finite()) {
            return Err(AppError::config("Cortical vertex coordinates must be finite."));
        }

        let world_to_voxel = match file.world_to_voxel {
            Some(rows) => Matrix4::from_fn(|r, c| rows[r][c]),
            None => Matrix4::identity(),
        };
        if world_to_voxel.iter().any(|v| !v.is_finite()) {
            return Err(AppError::config("world_to_voxel must be finite."));
        }

        let n_nodes = file.cortex.vertices.len() + file.white_matter.size;
        let projector = match file.projection {
            Some(p) => Projector::sparse(n_nodes, p.n_voxels, p.entries)?,
            None => Projector::Identity { n_nodes },
        };

        Ok(Self {
            volume_shape: file.volume_shape,
            world_to_voxel,
            cortex: file.cortex,
            white_matter: file.white_matter,
            projector,
        })
    }

    /// Number of model-space nodes (cortex vertices + white matter voxels).
    pub fn n_nodes(&self) -> usize {
        self.cortex.vertices.len() + self.white_matter.size
    }

    pub fn n_cortex(&self) -> usize {
        self.cortex.vertices.len()
    }

    /// Self-contained geometry: a sphere of cortical vertices centred in the
    /// volume, a white-matter block and identity projection.
    ///
    /// Vertices lie on a Fibonacci lattice, so the layout is deterministic.
    pub fn demo(
        volume_shape: [usize; 3],
        n_vertices: usize,
        wm_size: usize,
    ) -> Result<Self, AppError> {
        if n_vertices == 0 {
            return Err(AppError::config("Demo geometry needs at least one vertex."));
        }
        let min_dim = volume_shape.iter().copied().min().unwrap_or(0);
        if min_dim < 3 {
            return Err(AppError::config(format!(
                "Demo geometry needs a volume of at least 3 voxels per axis, got {volume_shape:?}."
            )));
        }
        let centre = volume_shape.map(|n| (n as f64 - 1.0) / 2.0);
        let radius = 0.4 * (min_dim as f64 - 1.0);
        let golden = PI * (3.0 - 5.0_f64.sqrt());

        let vertices = (0..n_vertices)
            .map(|i| {
                let z = if n_vertices == 1 {
                    0.0
                } else {
                    1.0 - 2.0 * i as f64 / (n_vertices as f64 - 1.0)
                };
                let r = (1.0 - z * z).max(0.0).sqrt();
                let theta = golden * i as f64;
                [
                    centre[0] + radius * r * theta.cos(),
                    centre[1] + radius * r * theta.sin(),
                    centre[2] + radius * z,
                ]
            })
            .collect();

        Self::from_file_model(GeometryFile {
            volume_shape,
            world_to_voxel: None,
            cortex: SurfaceNodes {
                name: "L".to_string(),
                vertices,
            },
            white_matter: VolumeRegion {
                name: "WM".to_string(),
                size: wm_size,
            },
            projection: None,
        })
    }
}

/// Read and validate a geometry JSON file.
pub fn read_geometry_json(path: &Path) -> Result<Geometry, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::config(format!("Failed to open geometry file '{}': {e}", path.display()))
    })?;
    let model: GeometryFile = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::config(format!("Invalid geometry JSON '{}': {e}", path.display())))?;
    Geometry::from_file_model(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_vertices_lie_inside_volume() {
        let geom = Geometry::demo([16, 16, 16], 200, 50).unwrap();
        assert_eq!(geom.n_nodes(), 250);
        for v in &geom.cortex.vertices {
            for (axis, c) in v.iter().enumerate() {
                assert!(*c >= 0.0 && *c <= geom.volume_shape[axis] as f64 - 1.0);
            }
        }
        assert_eq!(geom.projector.n_voxels(), 250);
    }

    #[test]
    fn parses_minimal_document() {
        let json = r#"{
            "volume_shape": [4, 4, 4],
            "cortex": { "name": "L", "vertices": [[1.0, 1.0, 1.0], [2.0, 2.5, 0.5]] },
            "white_matter": { "name": "WM", "size": 3 }
        }"#;
        let file: GeometryFile = serde_json::from_str(json).unwrap();
        let geom = Geometry::from_file_model(file).unwrap();
        assert_eq!(geom.n_cortex(), 2);
        assert_eq!(geom.world_to_voxel, Matrix4::identity());
        assert_eq!(geom.projector, Projector::Identity { n_nodes: 5 });
    }

    #[test]
    fn empty_cortex_is_a_configuration_error() {
        let json = r#"{
            "volume_shape": [4, 4, 4],
            "cortex": { "name": "L", "vertices": [] },
            "white_matter": { "name": "WM", "size": 3 }
        }"#;
        let file: GeometryFile = serde_json::from_str(json).unwrap();
        let err = Geometry::from_file_model(file).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn missing_file_is_a_configuration_error() {
        let err = read_geometry_json(Path::new("/nonexistent/geometry.json")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }
}
