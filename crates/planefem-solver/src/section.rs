//! Sections bind a material and a thickness to an element set.

use crate::error::{FemError, Result};
use crate::materials::Material;
use crate::mesh::Mesh;

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub material: Material,
    /// Out-of-plane thickness
    pub thickness: f64,
}

impl Section {
    pub fn new(material: Material, thickness: f64) -> Result<Self> {
        if !(thickness.is_finite() && thickness > 0.0) {
            return Err(FemError::InvalidThickness(thickness));
        }
        material.validate()?;
        Ok(Self {
            material,
            thickness,
        })
    }

    /// Assign a copy of this section to every element of `element_set`,
    /// replacing any previous assignment.
    pub fn assign_to(&self, mesh: &mut Mesh, element_set: &str) -> Result<()> {
        let ids = mesh.element_set(element_set)?.elements.clone();
        for id in ids {
            let element = mesh
                .elements
                .get_mut(&id)
                .ok_or(FemError::UnknownElement(id))?;
            element.section = Some(self.clone());
        }
        Ok(())
    }
}
