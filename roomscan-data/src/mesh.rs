//! Indexed triangle meshes produced by reconstruction and refinement.

use glam::Vec3;

/// An indexed triangle mesh.
///
/// Colors are optional: the raw reconstructed mesh has none, the colorize
/// pass fills them in from keyframes.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub colors: Option<Vec<Vec3>>,
    pub faces: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn new(positions: Vec<Vec3>, normals: Vec<Vec3>, faces: Vec<[u32; 3]>) -> Self {
        Self {
            positions,
            normals,
            colors: None,
            faces,
        }
    }

    pub fn with_colors(mut self, colors: Vec<Vec3>) -> Self {
        self.colors = Some(colors);
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn has_colors(&self) -> bool {
        self.colors.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Mean vertex position, Vec3::ZERO for an empty mesh.
    pub fn centroid(&self) -> Vec3 {
        if self.positions.is_empty() {
            return Vec3::ZERO;
        }
        self.positions.iter().copied().sum::<Vec3>() / self.positions.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_counts() {
        let mesh = Mesh::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![Vec3::Z; 3],
            vec![[0, 1, 2]],
        );
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.face_count(), 1);
        assert!(!mesh.has_colors());
    }

    #[test]
    fn test_centroid() {
        let mesh = Mesh::new(
            vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)],
            vec![Vec3::Z; 2],
            vec![],
        );
        assert_eq!(mesh.centroid(), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_empty_mesh_centroid() {
        assert_eq!(Mesh::default().centroid(), Vec3::ZERO);
    }
}
