//! Result hand-off.
//!
//! After a converged step the analysis recovers nodal fields and passes the
//! mesh to a [`ResultWriter`] together with a monotonically increasing step
//! index. Three writers are provided: an in-memory recorder, a JSON file per
//! step and a legacy ASCII VTK file per step for ParaView.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::elements::ElementKind;
use crate::error::{FemError, Result};
use crate::mesh::{Mesh, NodeId};

pub trait ResultWriter {
    fn write_step(&mut self, mesh: &Mesh, step: usize, time: f64) -> Result<()>;
}

/// Nodal results of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub coords: [f64; 3],
    /// `[u, v]`
    pub displacement: [f64; 2],
    /// Averaged stress `[xx, yy, zz, xy]`, if recovered
    pub stress: Option<Vec<f64>>,
    /// Averaged strain `[xx, yy, zz, xy]`, if recovered
    pub strain: Option<Vec<f64>>,
}

/// Nodal results of one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSnapshot {
    pub step: usize,
    pub time: f64,
    pub nodes: BTreeMap<NodeId, NodeSnapshot>,
}

impl StepSnapshot {
    pub fn capture(mesh: &Mesh, step: usize, time: f64) -> Self {
        let nodes = mesh
            .nodes
            .values()
            .map(|node| {
                (
                    node.id,
                    NodeSnapshot {
                        coords: node.coords(),
                        displacement: node.displacement(),
                        stress: node.stress.as_ref().map(|s| s.as_slice().to_vec()),
                        strain: node.strain.as_ref().map(|s| s.as_slice().to_vec()),
                    },
                )
            })
            .collect();
        Self { step, time, nodes }
    }
}

/// Keeps every step in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryWriter {
    pub steps: Vec<StepSnapshot>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&StepSnapshot> {
        self.steps.last()
    }
}

impl ResultWriter for MemoryWriter {
    fn write_step(&mut self, mesh: &Mesh, step: usize, time: f64) -> Result<()> {
        self.steps.push(StepSnapshot::capture(mesh, step, time));
        Ok(())
    }
}

/// Writes `<prefix>_<step>.json` into a directory, one file per step
#[derive(Debug, Clone)]
pub struct JsonWriter {
    dir: PathBuf,
    prefix: String,
}

impl JsonWriter {
    pub fn new(dir: impl AsRef<Path>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            prefix: prefix.into(),
        }
    }

    pub fn path_for(&self, step: usize) -> PathBuf {
        self.dir.join(format!("{}_{step:04}.json", self.prefix))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<StepSnapshot> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl ResultWriter for JsonWriter {
    fn write_step(&mut self, mesh: &Mesh, step: usize, time: f64) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let bytes = serde_json::to_vec_pretty(&StepSnapshot::capture(mesh, step, time))?;
        fs::write(self.path_for(step), bytes)?;
        Ok(())
    }
}

/// VTK cell type codes
#[derive(Debug, Clone, Copy)]
enum VtkCellType {
    Triangle = 5,
    Quad = 9,
}

impl From<ElementKind> for VtkCellType {
    fn from(kind: ElementKind) -> Self {
        match kind {
            ElementKind::TrianglePlaneStrain => VtkCellType::Triangle,
            ElementKind::QuadPlaneStrain => VtkCellType::Quad,
        }
    }
}

/// Writes `<prefix>_<step>.vtk` (legacy ASCII unstructured grid) into a
/// directory, one file per step.
///
/// Point data: `Displacement` as a vector `[u, v, 0]`, `Stress` and `Strain`
/// as full 3×3 tensors expanded from `[xx, yy, zz, xy]`. Nodes without
/// recovered fields get zero tensors.
#[derive(Debug, Clone)]
pub struct VtkWriter {
    dir: PathBuf,
    prefix: String,
}

impl VtkWriter {
    pub fn new(dir: impl AsRef<Path>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            prefix: prefix.into(),
        }
    }

    pub fn path_for(&self, step: usize) -> PathBuf {
        self.dir.join(format!("{}_{step:04}.vtk", self.prefix))
    }

    fn write_header(out: &mut impl Write, step: usize, time: f64) -> Result<()> {
        writeln!(out, "# vtk DataFile Version 3.0")?;
        writeln!(out, "planefem step {step} t = {time}")?;
        writeln!(out, "ASCII")?;
        writeln!(out, "DATASET UNSTRUCTURED_GRID")?;
        Ok(())
    }

    fn write_points(out: &mut impl Write, mesh: &Mesh) -> Result<()> {
        writeln!(out, "POINTS {} double", mesh.nodes.len())?;
        for node in mesh.nodes.values() {
            writeln!(out, "{} {} {}", node.x, node.y, node.z)?;
        }
        Ok(())
    }

    fn write_cells(out: &mut impl Write, mesh: &Mesh) -> Result<()> {
        let index: HashMap<NodeId, usize> = mesh
            .nodes
            .keys()
            .enumerate()
            .map(|(idx, &id)| (id, idx))
            .collect();

        let num_cells = mesh.elements.len();
        let total_size: usize = mesh.elements.values().map(|e| 1 + e.vertices.len()).sum();
        writeln!(out, "CELLS {num_cells} {total_size}")?;

        for element in mesh.elements.values() {
            write!(out, "{}", element.vertices.len())?;
            for &vertex in &element.vertices {
                let idx = index.get(&vertex).ok_or_else(|| FemError::UnknownNode {
                    node: vertex,
                    context: format!("element {}", element.id),
                })?;
                write!(out, " {idx}")?;
            }
            writeln!(out)?;
        }

        writeln!(out, "CELL_TYPES {num_cells}")?;
        for element in mesh.elements.values() {
            writeln!(out, "{}", VtkCellType::from(element.kind) as i32)?;
        }
        Ok(())
    }

    fn write_point_data(out: &mut impl Write, mesh: &Mesh) -> Result<()> {
        writeln!(out, "POINT_DATA {}", mesh.nodes.len())?;

        writeln!(out, "VECTORS Displacement double")?;
        for node in mesh.nodes.values() {
            let [u, v] = node.displacement();
            writeln!(out, "{u} {v} 0")?;
        }

        Self::write_tensor(out, "Stress", mesh.nodes.values().map(|n| n.stress.as_ref()))?;
        Self::write_tensor(out, "Strain", mesh.nodes.values().map(|n| n.strain.as_ref()))?;
        Ok(())
    }

    /// Expands plane-strain Voigt `[xx, yy, zz, xy]` to a symmetric 3×3 tensor
    fn write_tensor<'a>(
        out: &mut impl Write,
        name: &str,
        values: impl Iterator<Item = Option<&'a DVector<f64>>>,
    ) -> Result<()> {
        writeln!(out, "TENSORS {name} double")?;
        for value in values {
            let [xx, yy, zz, xy] = match value {
                Some(v) if v.len() >= 4 => [v[0], v[1], v[2], v[3]],
                _ => [0.0; 4],
            };
            writeln!(out, "{xx} {xy} 0")?;
            writeln!(out, "{xy} {yy} 0")?;
            writeln!(out, "0 0 {zz}")?;
        }
        Ok(())
    }
}

impl ResultWriter for VtkWriter {
    fn write_step(&mut self, mesh: &Mesh, step: usize, time: f64) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut out = BufWriter::new(File::create(self.path_for(step))?);
        Self::write_header(&mut out, step, time)?;
        Self::write_points(&mut out, mesh)?;
        Self::write_cells(&mut out, mesh)?;
        Self::write_point_data(&mut out, mesh)?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::Element;
    use crate::mesh::{Dof, DofKind, Node};

    fn mesh() -> Mesh {
        let mut mesh = Mesh::new();
        let mut node = Node::new(3, 1.0, 2.0, 0.0);
        let mut v = Dof::new(1, 3, DofKind::Uy, false);
        v.value = -0.25;
        node.dofs.push(v);
        node.stress = Some(DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]));
        mesh.add_node(node);
        mesh
    }

    #[test]
    fn memory_writer_records_steps() {
        let mut writer = MemoryWriter::new();
        writer.write_step(&mesh(), 0, 0.5).unwrap();
        writer.write_step(&mesh(), 1, 1.0).unwrap();

        assert_eq!(writer.steps.len(), 2);
        let last = writer.last().unwrap();
        assert_eq!(last.step, 1);
        let node = &last.nodes[&3];
        assert_eq!(node.displacement, [0.0, -0.25]);
        assert_eq!(node.stress.as_deref(), Some(&[1.0, 2.0, 3.0, 4.0][..]));
        assert!(node.strain.is_none());
    }

    #[test]
    fn json_writer_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = JsonWriter::new(dir.path().join("results"), "plate");
        writer.write_step(&mesh(), 7, 0.25).unwrap();

        let path = writer.path_for(7);
        assert!(path.ends_with("plate_0007.json"));
        let loaded = JsonWriter::load(&path).unwrap();
        assert_eq!(loaded, StepSnapshot::capture(&mesh(), 7, 0.25));
    }

    /// Unit square quad 1-2-3-4 plus triangle 2-5-3; node 3 carries results
    fn two_cell_mesh() -> Mesh {
        let mut mesh = Mesh::new();
        for (id, x, y) in [(1, 0.0, 0.0), (2, 1.0, 0.0), (3, 1.0, 1.0), (4, 0.0, 1.0), (5, 2.0, 0.5)] {
            mesh.add_node(Node::new(id, x, y, 0.0));
        }
        mesh.add_element(Element::new(1, ElementKind::QuadPlaneStrain, vec![1, 2, 3, 4]).unwrap())
            .unwrap();
        mesh.add_element(Element::new(2, ElementKind::TrianglePlaneStrain, vec![2, 5, 3]).unwrap())
            .unwrap();

        let node = mesh.nodes.get_mut(&3).unwrap();
        let mut u = Dof::new(5, 3, DofKind::Ux, false);
        u.value = 0.5;
        let mut v = Dof::new(6, 3, DofKind::Uy, false);
        v.value = -0.25;
        node.dofs.extend([u, v]);
        node.stress = Some(DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]));
        node.strain = Some(DVector::from_vec(vec![0.5, -1.5, 0.0, 2.5]));
        mesh
    }

    /// Lines following the first line equal to `header`
    fn section<'a>(lines: &'a [&'a str], header: &str, len: usize) -> &'a [&'a str] {
        let start = lines
            .iter()
            .position(|l| *l == header)
            .unwrap_or_else(|| panic!("missing '{header}'"));
        &lines[start + 1..start + 1 + len]
    }

    #[test]
    fn vtk_writer_writes_grid_and_point_data() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = VtkWriter::new(dir.path(), "plate");
        writer.write_step(&two_cell_mesh(), 2, 0.75).unwrap();

        let path = writer.path_for(2);
        assert!(path.ends_with("plate_0002.vtk"));
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "# vtk DataFile Version 3.0");
        assert_eq!(lines[3], "DATASET UNSTRUCTURED_GRID");
        assert_eq!(section(&lines, "POINTS 5 double", 5)[4], "2 0.5 0");

        // connectivity uses zero-based point indices
        assert_eq!(section(&lines, "CELLS 2 9", 2), ["4 0 1 2 3", "3 1 4 2"]);
        assert_eq!(section(&lines, "CELL_TYPES 2", 2), ["9", "5"]);

        assert!(lines.contains(&"POINT_DATA 5"));
        let disp = section(&lines, "VECTORS Displacement double", 5);
        assert_eq!(disp[2], "0.5 -0.25 0");
        assert_eq!(disp[0], "0 0 0");

        let stress = section(&lines, "TENSORS Stress double", 15);
        assert_eq!(&stress[6..9], ["1 4 0", "4 2 0", "0 0 3"]);
        assert_eq!(&stress[0..3], ["0 0 0", "0 0 0", "0 0 0"]);

        let strain = section(&lines, "TENSORS Strain double", 15);
        assert_eq!(&strain[6..9], ["0.5 2.5 0", "2.5 -1.5 0", "0 0 0"]);
    }

    #[test]
    fn vtk_writer_rejects_dangling_vertices() {
        let mut mesh = two_cell_mesh();
        mesh.nodes.remove(&5);
        let dir = tempfile::tempdir().unwrap();
        let err = VtkWriter::new(dir.path(), "bad")
            .write_step(&mesh, 0, 0.0)
            .unwrap_err();
        assert!(matches!(err, FemError::UnknownNode { node: 5, .. }));
    }
}
