use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::config::NEIGHBOR_SHELLS;
use crate::interfaces::{GrainId, PhaseId};
use crate::orientation::{euler_to_matrix, EulerAngles, Orientation};
use crate::shapes::{GrainShape, ShapeClass};

/// One grain of the synthetic microstructure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Grain {
    pub phase: PhaseId,
    /// Inactive grains were removed by the packing optimizer and keep their slot only
    pub active: bool,
    pub orientation: Orientation,
    /// ODF bin the orientation was drawn from
    pub odf_bin: usize,
    /// `[1, b/a, c/a]`
    pub aspect_ratios: [f64; 3],
    pub radii: [f64; 3],
    pub shape_class: ShapeClass,
    pub omega3: f64,
    pub shape_param: f64,
    /// Orientation of the principal axes in the sample frame
    pub axis_euler: EulerAngles,
    pub volume: f64,
    pub equivalent_diameter: f64,
    pub centroid: Vector3<f64>,
    /// Touches the sample boundary
    pub surface: bool,
    pub num_voxels: usize,
    pub neighbors: Vec<GrainId>,
    pub shared_areas: Vec<f64>,
    /// Rodrigues disorientation to each neighbour, aligned with `neighbors`
    pub misorientations: Vec<Vector3<f64>>,
    /// Grain centroids within 1, 2 and 3 radii of this one
    pub neighbor_histogram: [i64; NEIGHBOR_SHELLS],
    /// Packing-grid cells covered during packing
    #[serde(skip)]
    pub packing_cells: Vec<usize>,
}

impl Grain {
    pub fn new(phase: PhaseId, shape_class: ShapeClass) -> Self {
        Self {
            phase,
            active: false,
            orientation: Orientation::default(),
            odf_bin: 0,
            aspect_ratios: [1.0, 1.0, 1.0],
            radii: [0.0; 3],
            shape_class,
            omega3: 1.0,
            shape_param: 2.0,
            axis_euler: EulerAngles::default(),
            volume: 0.0,
            equivalent_diameter: 0.0,
            centroid: Vector3::zeros(),
            surface: false,
            num_voxels: 0,
            neighbors: Vec::new(),
            shared_areas: Vec::new(),
            misorientations: Vec::new(),
            neighbor_histogram: [0; NEIGHBOR_SHELLS],
            packing_cells: Vec::new(),
        }
    }

    pub fn shape(&self) -> GrainShape {
        GrainShape {
            class: self.shape_class,
            param: self.shape_param,
            radii: self.radii,
            frame: euler_to_matrix(&self.axis_euler),
        }
    }

    /// Position of `other` in this grain's neighbour list
    pub fn neighbor_slot(&self, other: GrainId) -> Option<usize> {
        self.neighbors.iter().position(|&n| n == other)
    }
}

/// Grain storage addressed by stable 1-based ids
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GrainArena {
    grains: Vec<Grain>,
}

impl GrainArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_grains(grains: Vec<Grain>) -> Self {
        Self { grains }
    }

    pub fn len(&self) -> usize {
        self.grains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grains.is_empty()
    }

    pub fn push(&mut self, grain: Grain) -> GrainId {
        self.grains.push(grain);
        self.grains.len()
    }

    /// Drops the most recently pushed grain
    pub fn pop(&mut self) -> Option<Grain> {
        self.grains.pop()
    }

    pub fn get(&self, id: GrainId) -> Option<&Grain> {
        id.checked_sub(1).and_then(|i| self.grains.get(i))
    }

    pub fn get_mut(&mut self, id: GrainId) -> Option<&mut Grain> {
        id.checked_sub(1).and_then(move |i| self.grains.get_mut(i))
    }

    /// Mutable access to two distinct grains at once
    pub fn pair_mut(&mut self, a: GrainId, b: GrainId) -> Option<(&mut Grain, &mut Grain)> {
        if a == b || a == 0 || b == 0 || a.max(b) > self.grains.len() {
            return None;
        }
        let (lo, hi) = (a.min(b) - 1, a.max(b) - 1);
        let (left, right) = self.grains.split_at_mut(hi);
        let (first, second) = (&mut left[lo], &mut right[0]);
        Some(if a < b { (first, second) } else { (second, first) })
    }

    pub fn ids(&self) -> impl Iterator<Item = GrainId> {
        1..=self.grains.len()
    }

    pub fn active_ids(&self) -> Vec<GrainId> {
        self.iter().filter(|(_, g)| g.active).map(|(id, _)| id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GrainId, &Grain)> {
        self.grains.iter().enumerate().map(|(i, g)| (i + 1, g))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (GrainId, &mut Grain)> {
        self.grains.iter_mut().enumerate().map(|(i, g)| (i + 1, g))
    }

    pub fn grains(&self) -> &[Grain] {
        &self.grains
    }

    pub fn into_grains(self) -> Vec<Grain> {
        self.grains
    }

    /// Keeps grains passing `keep` and renumbers them densely in their old order.
    ///
    /// Neighbour lists are cleared. Returns the old-to-new id map; index 0 and dropped grains
    /// map to 0.
    pub fn compact<F: Fn(&Grain) -> bool>(&mut self, keep: F) -> Vec<GrainId> {
        let mut remap = vec![0; self.grains.len() + 1];
        let mut kept = Vec::with_capacity(self.grains.len());
        for (i, grain) in std::mem::take(&mut self.grains).into_iter().enumerate() {
            if keep(&grain) {
                kept.push(grain);
                remap[i + 1] = kept.len();
            }
        }
        self.grains = kept;
        // topology refers to old ids and is rebuilt after compaction
        for grain in &mut self.grains {
            grain.neighbors.clear();
            grain.shared_areas.clear();
            grain.misorientations.clear();
        }
        remap
    }
}
