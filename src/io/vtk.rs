use crate::connectivity::{Connectivity, Tri3d2Connectivity, Tri6d2Connectivity};
use crate::driver::{RunSummary, StepObserver, StepReport, StepView};
use crate::mesh::{Mesh2d, Tri6Mesh2d};
use crate::space::FlowDomain;
use eyre::WrapErr;
use log::debug;
use nalgebra::DVectorView;
use std::convert::TryInto;
use std::error::Error;
use std::fmt;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use vtkio::model::{
    Attribute, Attributes, ByteOrder, CellType, Cells, DataArray, DataSet, ElementType, IOBuffer, Piece,
    UnstructuredGridPiece, Version, VertexNumbers, Vtk,
};

/// Represents connectivity that is supported by VTK.
pub trait VtkCellConnectivity: Connectivity {
    fn num_nodes(&self) -> usize {
        self.vertex_indices().len()
    }

    fn cell_type(&self) -> CellType;

    /// Write connectivity in VTK node order.
    ///
    /// Panics if `connectivity.len() != self.num_nodes()`.
    fn write_vtk_connectivity(&self, connectivity: &mut [usize]) {
        assert_eq!(connectivity.len(), self.vertex_indices().len());
        connectivity.clone_from_slice(self.vertex_indices());
    }
}

impl VtkCellConnectivity for Tri3d2Connectivity {
    fn cell_type(&self) -> CellType {
        CellType::Triangle
    }
}

// The edge nodes are ordered (0, 1), (1, 2), (2, 0) like in VTK
impl VtkCellConnectivity for Tri6d2Connectivity {
    fn cell_type(&self) -> CellType {
        CellType::QuadraticTriangle
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VtkError {
    /// A point attribute does not have one entry per component and mesh vertex.
    AttributeLength {
        name: String,
        expected: usize,
        actual: usize,
    },
    IndexOverflow {
        index: usize,
    },
}

impl fmt::Display for VtkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttributeLength { name, expected, actual } => write!(
                f,
                "Point attribute \"{}\" has {} entries, expected {}",
                name, actual, expected
            ),
            Self::IndexOverflow { index } => write!(f, "Index {} does not fit into a VTK index", index),
        }
    }
}

impl Error for VtkError {}

#[derive(Debug, Clone)]
struct PointAttribute {
    name: String,
    num_components: usize,
    data: Vec<f64>,
}

/// Builds a VTK unstructured grid from a finite element mesh and point data.
pub struct FiniteElementMeshDataSetBuilder<'a, C> {
    mesh: &'a Mesh2d<f64, C>,
    attributes: Vec<PointAttribute>,
    // Only used for exporting directly to file
    title: Option<String>,
}

impl<'a, C> FiniteElementMeshDataSetBuilder<'a, C>
where
    C: VtkCellConnectivity,
{
    pub fn from_mesh(mesh: &'a Mesh2d<f64, C>) -> Self {
        Self {
            mesh,
            attributes: Vec::new(),
            title: None,
        }
    }

    pub fn with_title(self, title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..self
        }
    }

    /// Adds a point attribute with `num_components` interleaved entries per mesh vertex.
    ///
    /// Two-component attributes are written as VTK vectors, padded with a zero third
    /// component.
    pub fn with_point_attribute(mut self, name: impl Into<String>, num_components: usize, data: Vec<f64>) -> Self {
        self.attributes.push(PointAttribute {
            name: name.into(),
            num_components,
            data,
        });
        self
    }

    pub fn try_build(&self) -> Result<DataSet, VtkError> {
        let num_points = self.mesh.vertices().len();
        let mut points = Vec::with_capacity(3 * num_points);
        for v in self.mesh.vertices() {
            points.extend_from_slice(&[v.x, v.y, 0.0]);
        }

        let to_vtk_index = |index: usize| -> Result<u64, VtkError> {
            index.try_into().map_err(|_| VtkError::IndexOverflow { index })
        };

        let mut connectivity = Vec::new();
        let mut offsets = Vec::with_capacity(self.mesh.connectivity().len());
        let mut cell_types = Vec::with_capacity(self.mesh.connectivity().len());
        let mut vertex_indices = Vec::new();
        for cell in self.mesh.connectivity() {
            vertex_indices.clear();
            vertex_indices.resize(cell.num_nodes(), 0);
            cell.write_vtk_connectivity(&mut vertex_indices);
            for &idx in &vertex_indices {
                connectivity.push(to_vtk_index(idx)?);
            }
            offsets.push(to_vtk_index(connectivity.len())?);
            cell_types.push(cell.cell_type());
        }

        let mut data = Attributes::new();
        for attribute in &self.attributes {
            let expected = attribute.num_components * num_points;
            if attribute.data.len() != expected {
                return Err(VtkError::AttributeLength {
                    name: attribute.name.clone(),
                    expected,
                    actual: attribute.data.len(),
                });
            }
            let (elem, values) = match attribute.num_components {
                2 => {
                    let padded = attribute
                        .data
                        .chunks_exact(2)
                        .flat_map(|v| [v[0], v[1], 0.0])
                        .collect::<Vec<_>>();
                    (ElementType::Vectors, padded)
                }
                n => (
                    ElementType::Scalars {
                        num_comp: n as u32,
                        lookup_table: None,
                    },
                    attribute.data.clone(),
                ),
            };
            data.point.push(Attribute::DataArray(DataArray {
                name: attribute.name.clone(),
                elem,
                data: IOBuffer::from(values),
            }));
        }

        let piece = UnstructuredGridPiece {
            points: IOBuffer::from(points),
            cells: Cells {
                cell_verts: VertexNumbers::XML { connectivity, offsets },
                types: cell_types,
            },
            data,
        };

        Ok(DataSet::UnstructuredGrid {
            meta: None,
            pieces: vec![Piece::Inline(Box::new(piece))],
        })
    }

    /// Exports the dataset to a file. The format is deduced from the extension.
    pub fn try_export(&self, filename: impl AsRef<Path>) -> eyre::Result<()> {
        let filepath = filename.as_ref();
        let fallback_title = filepath
            .file_stem()
            .map(|os_str| os_str.to_string_lossy().to_string())
            .unwrap_or_else(|| "untitled".to_string());
        let dataset = self.try_build()?;
        Vtk {
            version: Version { major: 4, minor: 1 },
            // If we don't have a title then just make the filepath the title
            title: self.title.clone().unwrap_or(fallback_title),
            byte_order: ByteOrder::BigEndian,
            data: dataset,
            file_path: None,
        }
        .export(filepath)
        .wrap_err_with(|| format!("failed to write VTK file {}", filepath.display()))?;
        Ok(())
    }
}

/// Evaluates a P1 field with `num_components` interleaved entries per vertex at every P2 node.
///
/// Vertex nodes take the vertex values, edge nodes the mean of their two end points.
pub fn p1_to_p2_nodes(domain: &FlowDomain, values: DVectorView<f64>, num_components: usize) -> Vec<f64> {
    let mut output = Vec::with_capacity(num_components * domain.num_nodes());
    output.extend(values.iter().copied());
    for &[a, b] in domain.topology().edges() {
        for c in 0..num_components {
            output.push(0.5 * (values[num_components * a + c] + values[num_components * b + c]));
        }
    }
    output
}

/// Builds a quadratic triangle mesh in the current configuration together with the point
/// fields `velocity`, `pressure` and, on moving domains, `mesh_velocity` and `displacement`.
pub fn flow_dataset_builder<'a>(
    mesh: &'a Tri6Mesh2d<f64>,
    view: &StepView,
) -> FiniteElementMeshDataSetBuilder<'a, Tri6d2Connectivity> {
    let domain = view.domain;
    let mut builder = FiniteElementMeshDataSetBuilder::from_mesh(mesh)
        .with_point_attribute("velocity", 2, view.state.velocity().iter().copied().collect())
        .with_point_attribute("pressure", 1, p1_to_p2_nodes(domain, view.state.pressure(), 1));
    if let Some(motion) = view.motion {
        builder = builder
            .with_point_attribute("mesh_velocity", 2, p1_to_p2_nodes(domain, motion.mesh_velocity(), 2))
            .with_point_attribute("displacement", 2, p1_to_p2_nodes(domain, motion.displacement(), 2));
    }
    builder
}

fn current_tri6_mesh(domain: &FlowDomain) -> Tri6Mesh2d<f64> {
    Tri6Mesh2d::from_vertices_and_connectivity(
        domain.node_positions().to_vec(),
        domain.topology().connectivity().to_vec(),
    )
}

/// Observer that writes the trajectory as a series of `.vtu` files, indexed by a ParaView
/// `.pvd` collection.
#[derive(Debug, Clone)]
pub struct VtkTrajectoryWriter {
    directory: PathBuf,
    prefix: String,
    every: usize,
    written: Vec<(f64, String)>,
    last_written_step: Option<usize>,
}

impl VtkTrajectoryWriter {
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
            every: 1,
            written: Vec::new(),
            last_written_step: None,
        }
    }

    /// Only writes every `every`-th step. The initial and final states are always written.
    pub fn with_interval(self, every: usize) -> Self {
        Self {
            every: every.max(1),
            ..self
        }
    }

    pub fn collection_path(&self) -> PathBuf {
        self.directory.join(format!("{}.pvd", self.prefix))
    }

    /// Files written so far together with their time, in order.
    pub fn written_files(&self) -> &[(f64, String)] {
        &self.written
    }

    fn write_step(&mut self, view: &StepView) -> eyre::Result<()> {
        std::fs::create_dir_all(&self.directory)
            .wrap_err_with(|| format!("failed to create output directory {}", self.directory.display()))?;
        let file_name = format!("{}_{:05}.vtu", self.prefix, view.step);
        let mesh = current_tri6_mesh(view.domain);
        flow_dataset_builder(&mesh, view)
            .with_title(format!("{} t = {}", self.prefix, view.time))
            .try_export(self.directory.join(&file_name))?;
        debug!("Wrote {}", file_name);

        self.written.push((view.time, file_name));
        self.last_written_step = Some(view.step);
        self.write_collection()
    }

    fn write_collection(&self) -> eyre::Result<()> {
        let mut pvd = String::new();
        writeln!(pvd, r#"<?xml version="1.0"?>"#)?;
        writeln!(pvd, r#"<VTKFile type="Collection" version="0.1" byte_order="LittleEndian">"#)?;
        writeln!(pvd, "  <Collection>")?;
        for (time, file_name) in &self.written {
            writeln!(
                pvd,
                r#"    <DataSet timestep="{}" group="" part="0" file="{}"/>"#,
                time, file_name
            )?;
        }
        writeln!(pvd, "  </Collection>")?;
        writeln!(pvd, "</VTKFile>")?;

        let path = self.collection_path();
        std::fs::write(&path, pvd).wrap_err_with(|| format!("failed to write {}", path.display()))
    }
}

impl StepObserver for VtkTrajectoryWriter {
    fn on_start(&mut self, view: StepView) -> eyre::Result<()> {
        self.write_step(&view)
    }

    fn on_step(&mut self, report: &StepReport, view: StepView) -> eyre::Result<()> {
        if report.step % self.every == 0 {
            self.write_step(&view)?;
        }
        Ok(())
    }

    fn on_finish(&mut self, _summary: &RunSummary, view: StepView) -> eyre::Result<()> {
        if self.last_written_step != Some(view.step) {
            self.write_step(&view)?;
        }
        Ok(())
    }
}
