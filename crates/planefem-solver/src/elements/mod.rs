//! Continuum elements for plane-strain analysis.
//!
//! Element kinds form a closed set. Each element owns its integration
//! points (and through them the material state) and refers to its vertices
//! by node id.

use std::collections::BTreeMap;
use std::fmt;

use nalgebra::{DMatrix, DVector};

use crate::error::{FemError, Result};
use crate::interpolation::Interpolator;
use crate::mesh::{Dof, DofKind, ElementId, Node, NodeId};
use crate::quadrature::{ElementShape, GaussIntegration, GaussPoint};
use crate::section::Section;
use crate::time::StepContext;

pub mod plane_strain;

pub use plane_strain::strain_displacement;

/// Element kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    /// 3-node linear triangle, plane strain
    TrianglePlaneStrain,
    /// 4-node bilinear quadrilateral, plane strain
    QuadPlaneStrain,
}

impl ElementKind {
    pub fn shape(self) -> ElementShape {
        match self {
            ElementKind::TrianglePlaneStrain => ElementShape::Triangle,
            ElementKind::QuadPlaneStrain => ElementShape::Quadrilateral,
        }
    }

    /// Get the number of nodes for this element kind
    pub fn num_nodes(self) -> usize {
        match self {
            ElementKind::TrianglePlaneStrain => 3,
            ElementKind::QuadPlaneStrain => 4,
        }
    }

    /// DOF kinds required at every vertex
    pub fn dof_mask(self) -> &'static [DofKind] {
        &DofKind::ALL
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::TrianglePlaneStrain => f.write_str("triangle (plane strain)"),
            ElementKind::QuadPlaneStrain => f.write_str("quadrilateral (plane strain)"),
        }
    }
}

/// A finite element
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Element ID
    pub id: ElementId,
    pub kind: ElementKind,
    /// Vertex node IDs, counter-clockwise. Defines the local DOF order.
    pub vertices: Vec<NodeId>,
    /// Assigned section; must be set before analysis
    pub section: Option<Section>,
    integration: GaussIntegration,
}

impl Element {
    /// Create an element with the default quadrature rule for its shape
    pub fn new(id: ElementId, kind: ElementKind, vertices: Vec<NodeId>) -> Result<Self> {
        if vertices.len() != kind.num_nodes() {
            return Err(FemError::InvalidConnectivity {
                element: id,
                reason: format!(
                    "{} nodes given, {kind} needs {}",
                    vertices.len(),
                    kind.num_nodes()
                ),
            });
        }
        for (i, v) in vertices.iter().enumerate() {
            if vertices[..i].contains(v) {
                return Err(FemError::InvalidConnectivity {
                    element: id,
                    reason: format!("node {v} appears more than once"),
                });
            }
        }

        let shape = kind.shape();
        Ok(Self {
            id,
            kind,
            vertices,
            section: None,
            integration: GaussIntegration::new(shape, GaussIntegration::default_points(shape))?,
        })
    }

    /// Replace the quadrature rule
    pub fn with_integration_points(mut self, num_points: usize) -> Result<Self> {
        self.integration = GaussIntegration::new(self.kind.shape(), num_points)?;
        Ok(self)
    }

    pub fn with_section(mut self, section: Section) -> Self {
        self.section = Some(section);
        self
    }

    pub fn interpolator(&self) -> Interpolator {
        Interpolator::for_shape(self.kind.shape())
    }

    pub fn integration(&self) -> &GaussIntegration {
        &self.integration
    }

    pub fn dof_mask(&self) -> &'static [DofKind] {
        self.kind.dof_mask()
    }

    /// Number of local DOFs
    pub fn num_dofs(&self) -> usize {
        self.vertices.len() * self.dof_mask().len()
    }

    fn section(&self) -> Result<&Section> {
        self.section
            .as_ref()
            .ok_or_else(|| FemError::MissingSection(vec![self.id]))
    }

    /// Vertex coordinates resolved against the mesh nodes
    pub fn vertex_coords(&self, nodes: &BTreeMap<NodeId, Node>) -> Result<Vec<[f64; 3]>> {
        self.vertices
            .iter()
            .map(|&id| {
                nodes.get(&id).map(Node::coords).ok_or_else(|| FemError::UnknownNode {
                    node: id,
                    context: format!("element {}", self.id),
                })
            })
            .collect()
    }

    /// Local DOFs in local order (vertex-major, then mask order)
    pub fn local_dofs<'a>(&self, nodes: &'a BTreeMap<NodeId, Node>) -> Result<Vec<&'a Dof>> {
        let mut dofs = Vec::with_capacity(self.num_dofs());
        for &id in &self.vertices {
            let node = nodes.get(&id).ok_or_else(|| FemError::UnknownNode {
                node: id,
                context: format!("element {}", self.id),
            })?;
            for &kind in self.dof_mask() {
                let dof = node.dof(kind).ok_or_else(|| {
                    FemError::InvalidState(format!(
                        "node {id} has no {kind} DOF (DOFs not created?)"
                    ))
                })?;
                dofs.push(dof);
            }
        }
        Ok(dofs)
    }

    /// Current values of the local DOFs, free and prescribed alike
    pub fn local_dof_values(&self, nodes: &BTreeMap<NodeId, Node>) -> Result<DVector<f64>> {
        let values: Vec<f64> = self.local_dofs(nodes)?.iter().map(|d| d.value).collect();
        Ok(DVector::from_vec(values))
    }

    /// Global derivatives and det J at a Gauss point
    fn geometry(&self, gp: &GaussPoint, coords: &[[f64; 3]]) -> Result<(DMatrix<f64>, f64)> {
        let interp = self.interpolator();
        let det_j = interp.det_j(gp.local, coords);
        if !(det_j > 0.0) {
            return Err(FemError::DegenerateElement {
                element: self.id,
                det_j,
            });
        }
        let dndx = interp
            .eval_dndx(gp.local, coords)
            .ok_or(FemError::DegenerateElement {
                element: self.id,
                det_j,
            })?;
        Ok((dndx, det_j))
    }

    /// Strain-displacement matrix at a Gauss point
    pub fn compute_b(&self, gp: &GaussPoint, coords: &[[f64; 3]]) -> Result<DMatrix<f64>> {
        let (dndx, _) = self.geometry(gp, coords)?;
        Ok(strain_displacement(&dndx))
    }

    /// |det J| · w · thickness
    pub fn volume_around(&self, gp: &GaussPoint, coords: &[[f64; 3]]) -> Result<f64> {
        let (_, det_j) = self.geometry(gp, coords)?;
        Ok(det_j.abs() * gp.weight * self.section()?.thickness)
    }

    /// Ke = Σ Bᵀ D B dV
    pub fn stiffness_matrix(
        &self,
        nodes: &BTreeMap<NodeId, Node>,
        ctx: &StepContext,
    ) -> Result<DMatrix<f64>> {
        let section = self.section()?;
        let coords = self.vertex_coords(nodes)?;
        let n = self.num_dofs();
        let mut ke = DMatrix::zeros(n, n);

        for gp in self.integration.points() {
            let (dndx, det_j) = self.geometry(gp, &coords)?;
            let b = strain_displacement(&dndx);
            let status = self.status(gp)?;
            let d = section.material.tangent(status, ctx);
            let dv = det_j * gp.weight * section.thickness;
            ke += b.transpose() * d * &b * dv;
        }

        Ok(ke)
    }

    /// fe = Σ Bᵀ σ dV, with σ evaluated from the current DOF values.
    ///
    /// Updates the trial state of every Gauss point.
    pub fn internal_forces(
        &mut self,
        nodes: &BTreeMap<NodeId, Node>,
        ctx: &StepContext,
    ) -> Result<DVector<f64>> {
        let coords = self.vertex_coords(nodes)?;
        let u = self.local_dof_values(nodes)?;
        let mut fe = DVector::zeros(self.num_dofs());

        // geometry first: it borrows `self` immutably
        let mut kinematics = Vec::with_capacity(self.integration.len());
        for gp in self.integration.points() {
            let (dndx, det_j) = self.geometry(gp, &coords)?;
            kinematics.push((strain_displacement(&dndx), det_j));
        }

        let id = self.id;
        let section = self
            .section
            .as_ref()
            .ok_or_else(|| FemError::MissingSection(vec![id]))?;

        for (gp, (b, det_j)) in self.integration.points_mut().iter_mut().zip(kinematics) {
            let status = gp.status.as_mut().ok_or_else(|| missing_status(id))?;
            let strain = &b * &u;
            let stress = section.material.compute_stress(&strain, status, ctx);
            fe += b.transpose() * stress * (det_j * gp.weight * section.thickness);
        }

        Ok(fe)
    }

    /// Push every Gauss point's committed stress and strain onto the sample
    /// lists of every vertex node.
    pub fn recover_fields_in_nodes(&self, nodes: &mut BTreeMap<NodeId, Node>) -> Result<()> {
        for gp in self.integration.points() {
            let status = self.status(gp)?;
            for &id in &self.vertices {
                let node = nodes.get_mut(&id).ok_or_else(|| FemError::UnknownNode {
                    node: id,
                    context: format!("element {}", self.id),
                })?;
                node.stress_samples.push(status.committed.stress.clone());
                node.strain_samples.push(status.committed.strain.clone());
            }
        }
        Ok(())
    }

    /// Fresh material state at every Gauss point
    pub fn create_material_statuses(&mut self) -> Result<()> {
        let status = self.section()?.material.create_status();
        for gp in self.integration.points_mut() {
            gp.status = Some(status.clone());
        }
        Ok(())
    }

    /// Commit trial material state at every Gauss point
    pub fn commit(&mut self) {
        for gp in self.integration.points_mut() {
            if let Some(status) = gp.status.as_mut() {
                status.commit();
            }
        }
    }

    fn status<'a>(&self, gp: &'a GaussPoint) -> Result<&'a crate::materials::MaterialStatus> {
        gp.status.as_ref().ok_or_else(|| missing_status(self.id))
    }
}

fn missing_status(element: ElementId) -> FemError {
    FemError::InvalidState(format!(
        "element {element} has no material status (create_material_statuses not called)"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::Material;
    use crate::mesh::{Dof, DofKind};

    fn nodes_for(coords: &[[f64; 2]]) -> BTreeMap<NodeId, Node> {
        let mut nodes = BTreeMap::new();
        for (i, c) in coords.iter().enumerate() {
            let id = i + 1;
            let mut node = Node::new(id, c[0], c[1], 0.0);
            node.dofs.push(Dof::new(2 * i + 1, id, DofKind::Ux, false));
            node.dofs.push(Dof::new(2 * i + 2, id, DofKind::Uy, false));
            nodes.insert(id, node);
        }
        nodes
    }

    fn section(nu: f64, thickness: f64) -> Section {
        Section::new(Material::linear_isotropic(1000.0, nu).unwrap(), thickness).unwrap()
    }

    fn quad() -> (Element, BTreeMap<NodeId, Node>) {
        let nodes = nodes_for(&[[0.0, 0.0], [2.0, 0.2], [2.3, 1.5], [-0.1, 1.1]]);
        let mut el = Element::new(1, ElementKind::QuadPlaneStrain, vec![1, 2, 3, 4])
            .unwrap()
            .with_section(section(0.3, 0.7));
        el.create_material_statuses().unwrap();
        (el, nodes)
    }

    fn triangle() -> (Element, BTreeMap<NodeId, Node>) {
        let nodes = nodes_for(&[[0.0, 0.0], [2.0, 0.5], [0.5, 1.5]]);
        let mut el = Element::new(2, ElementKind::TrianglePlaneStrain, vec![1, 2, 3])
            .unwrap()
            .with_section(section(0.25, 2.0));
        el.create_material_statuses().unwrap();
        (el, nodes)
    }

    #[test]
    fn stiffness_is_symmetric() {
        let ctx = StepContext::at(0.0);
        for (el, nodes) in [quad(), triangle()] {
            let ke = el.stiffness_matrix(&nodes, &ctx).unwrap();
            assert_eq!(ke.nrows(), el.num_dofs());
            let scale = ke.amax();
            for i in 0..ke.nrows() {
                for j in 0..ke.ncols() {
                    assert!(
                        (ke[(i, j)] - ke[(j, i)]).abs() <= 1e-12 * scale,
                        "Ke[{i},{j}] = {} but Ke[{j},{i}] = {}",
                        ke[(i, j)],
                        ke[(j, i)]
                    );
                }
            }
        }
    }

    #[test]
    fn rigid_body_modes_are_stress_free() {
        let ctx = StepContext::at(0.0);
        for (el, nodes) in [quad(), triangle()] {
            let ke = el.stiffness_matrix(&nodes, &ctx).unwrap();
            let coords = el.vertex_coords(&nodes).unwrap();
            let n = coords.len();

            let tx = DVector::from_fn(2 * n, |i, _| if i % 2 == 0 { 1.0 } else { 0.0 });
            let ty = DVector::from_fn(2 * n, |i, _| if i % 2 == 1 { 1.0 } else { 0.0 });
            // small rotation: u = -y, v = x
            let rot = DVector::from_fn(2 * n, |i, _| {
                let c = coords[i / 2];
                if i % 2 == 0 { -c[1] } else { c[0] }
            });

            for mode in [tx, ty, rot] {
                let f = &ke * mode;
                assert!(f.amax() < 1e-9 * ke.amax(), "rigid mode produced force {f}");
            }
        }
    }

    #[test]
    fn volume_sums_to_area_times_thickness() {
        for (el, nodes) in [quad(), triangle()] {
            let coords = el.vertex_coords(&nodes).unwrap();
            let area = el.interpolator().area(&coords);
            let volume: f64 = el
                .integration()
                .points()
                .iter()
                .map(|gp| el.volume_around(gp, &coords).unwrap())
                .sum();
            let thickness = el.section.as_ref().unwrap().thickness;
            assert!(
                (volume - area * thickness).abs() < 1e-12,
                "volume {volume} vs area·t {}",
                area * thickness
            );
        }
    }

    #[test]
    fn internal_forces_match_stiffness_times_displacement() {
        let ctx = StepContext::at(0.0);
        let (mut el, mut nodes) = quad();
        let values = [0.01, -0.02, 0.03, 0.0, -0.01, 0.015, 0.005, 0.02];
        for (i, node) in nodes.values_mut().enumerate() {
            node.dofs[0].value = values[2 * i];
            node.dofs[1].value = values[2 * i + 1];
        }

        let ke = el.stiffness_matrix(&nodes, &ctx).unwrap();
        let fe = el.internal_forces(&nodes, &ctx).unwrap();
        let expected = &ke * DVector::from_row_slice(&values);
        assert!((fe - expected).amax() < 1e-10 * ke.amax());

        // trial state written, committed state untouched until commit
        let gp = &el.integration().points()[0];
        let status = gp.status.as_ref().unwrap();
        assert!(status.trial.strain.amax() > 0.0);
        assert_eq!(status.committed.strain.amax(), 0.0);
        el.commit();
        let status = el.integration().points()[0].status.as_ref().unwrap();
        assert_eq!(status.committed, status.trial);
    }

    #[test]
    fn uniform_strain_is_recovered_exactly() {
        let ctx = StepContext::at(0.0);
        let (mut el, mut nodes) = triangle();
        // u = 1e-3 x, v = -2e-3 y + 5e-4 x
        for node in nodes.values_mut() {
            let (x, y) = (node.x, node.y);
            node.dofs[0].value = 1e-3 * x;
            node.dofs[1].value = -2e-3 * y + 5e-4 * x;
        }
        el.internal_forces(&nodes, &ctx).unwrap();
        el.commit();
        el.recover_fields_in_nodes(&mut nodes).unwrap();

        for node in nodes.values_mut() {
            assert_eq!(node.strain_samples.len(), 1);
            node.average_samples();
            let strain = node.strain.as_ref().unwrap();
            assert!((strain[0] - 1e-3).abs() < 1e-15);
            assert!((strain[1] + 2e-3).abs() < 1e-15);
            assert_eq!(strain[2], 0.0);
            assert!((strain[3] - 5e-4).abs() < 1e-15);
        }
    }

    #[test]
    fn alternative_quadrature_rules() {
        let ctx = StepContext::at(0.0);
        let (el, nodes) = triangle();
        let k1 = el.stiffness_matrix(&nodes, &ctx).unwrap();

        // constant B: the 3-point rule integrates the same matrix
        let mut el3 = el.clone().with_integration_points(3).unwrap();
        el3.create_material_statuses().unwrap();
        let k3 = el3.stiffness_matrix(&nodes, &ctx).unwrap();
        assert!((k1 - k3).amax() < 1e-10);

        assert!(matches!(
            el.with_integration_points(2),
            Err(FemError::MissingQuadrature { points: 2, .. })
        ));
    }

    #[test]
    fn rejects_bad_connectivity_and_inverted_geometry() {
        assert!(matches!(
            Element::new(5, ElementKind::QuadPlaneStrain, vec![1, 2, 3]),
            Err(FemError::InvalidConnectivity { element: 5, .. })
        ));
        assert!(matches!(
            Element::new(6, ElementKind::TrianglePlaneStrain, vec![1, 2, 1]),
            Err(FemError::InvalidConnectivity { element: 6, .. })
        ));

        let ctx = StepContext::at(0.0);
        // clockwise ordering gives det J < 0
        let nodes = nodes_for(&[[0.0, 0.0], [0.0, 1.0], [1.0, 0.0]]);
        let mut el = Element::new(7, ElementKind::TrianglePlaneStrain, vec![1, 2, 3])
            .unwrap()
            .with_section(section(0.3, 1.0));
        el.create_material_statuses().unwrap();
        assert!(matches!(
            el.stiffness_matrix(&nodes, &ctx),
            Err(FemError::DegenerateElement { element: 7, .. })
        ));
    }

    #[test]
    fn missing_section_is_reported() {
        let (mut el, nodes) = quad();
        el.section = None;
        assert!(matches!(
            el.stiffness_matrix(&nodes, &StepContext::at(0.0)),
            Err(FemError::MissingSection(ids)) if ids == vec![1]
        ));
    }
}
