use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::interfaces::Boundary;
use crate::shapes::GrainShape;

/// Regular grid of cells over the sample box
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GridGeometry {
    pub dims: [usize; 3],
    pub resolution: [f64; 3],
    pub boundary: Boundary,
}

impl GridGeometry {
    pub fn new(dims: [usize; 3], resolution: [f64; 3], boundary: Boundary) -> Self {
        Self {
            dims,
            resolution,
            boundary,
        }
    }

    /// Grid spanning exactly `size` with cells no wider than `resolution`.
    ///
    /// Cell counts round up and keep at least one cell per axis; the cell edge then shrinks so
    /// the grid ends on the sample faces.
    pub fn covering(size: [f64; 3], resolution: [f64; 3], boundary: Boundary) -> Self {
        let mut dims = [1; 3];
        let mut edges = resolution;
        for axis in 0..3 {
            // exact multiples must not round up on floating-point noise
            let cells = size[axis] / resolution[axis] - 1e-9;
            dims[axis] = (cells.ceil() as usize).max(1);
            edges[axis] = size[axis] / dims[axis] as f64;
        }
        Self::new(dims, edges, boundary)
    }

    pub fn total(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn size(&self) -> [f64; 3] {
        [
            self.dims[0] as f64 * self.resolution[0],
            self.dims[1] as f64 * self.resolution[1],
            self.dims[2] as f64 * self.resolution[2],
        ]
    }

    /// Linear index of (column, row, plane)
    pub fn index(&self, cell: [usize; 3]) -> usize {
        cell[2] * self.dims[0] * self.dims[1] + cell[1] * self.dims[0] + cell[0]
    }

    pub fn cell_of_index(&self, index: usize) -> [usize; 3] {
        let plane_size = self.dims[0] * self.dims[1];
        [
            index % self.dims[0],
            (index / self.dims[0]) % self.dims[1],
            index / plane_size,
        ]
    }

    pub fn cell_center(&self, cell: [usize; 3]) -> Vector3<f64> {
        Vector3::new(
            (cell[0] as f64 + 0.5) * self.resolution[0],
            (cell[1] as f64 + 0.5) * self.resolution[1],
            (cell[2] as f64 + 0.5) * self.resolution[2],
        )
    }

    /// Cell containing `point`; may lie outside the grid
    pub fn cell_of_point(&self, point: &Vector3<f64>) -> [i64; 3] {
        [
            (point.x / self.resolution[0]).floor() as i64,
            (point.y / self.resolution[1]).floor() as i64,
            (point.z / self.resolution[2]).floor() as i64,
        ]
    }

    /// Face-sharing neighbours of a cell, never wrapping across the sample boundary
    pub fn face_neighbors(&self, index: usize) -> impl Iterator<Item = usize> {
        self.face_neighbors_with_axis(index).map(|(n, _)| n)
    }

    /// Face neighbours paired with the axis (0 = x, 1 = y, 2 = z) they lie along,
    /// in the order -z, -y, -x, +x, +y, +z
    pub fn face_neighbors_with_axis(&self, index: usize) -> impl Iterator<Item = (usize, usize)> {
        let [x, y, z] = self.cell_of_index(index);
        let [nx, ny, nz] = self.dims;
        let plane = nx * ny;
        [
            (z > 0).then(|| (index - plane, 2)),
            (y > 0).then(|| (index - nx, 1)),
            (x > 0).then(|| (index - 1, 0)),
            (x + 1 < nx).then(|| (index + 1, 0)),
            (y + 1 < ny).then(|| (index + nx, 1)),
            (z + 1 < nz).then(|| (index + plane, 2)),
        ]
        .into_iter()
        .flatten()
    }

    /// Face neighbours in the same order, wrapping across the sample faces on periodic grids
    pub fn linked_neighbors(&self, index: usize) -> impl Iterator<Item = usize> {
        let geometry = *self;
        let cell = self.cell_of_index(index);
        let periodic = self.boundary.is_periodic();
        [(2, -1i64), (1, -1), (0, -1), (0, 1), (1, 1), (2, 1)]
            .into_iter()
            .filter_map(move |(axis, step)| {
                let n = geometry.dims[axis] as i64;
                let mut c = cell.map(|x| x as i64);
                c[axis] += step;
                if c[axis] < 0 || c[axis] >= n {
                    if !periodic || n == 1 {
                        return None;
                    }
                    c[axis] = c[axis].rem_euclid(n);
                }
                Some(geometry.index(c.map(|x| x as usize)))
            })
    }

    /// Area of the face shared with a neighbour along `axis`
    pub fn face_area(&self, axis: usize) -> f64 {
        let [rx, ry, rz] = self.resolution;
        match axis {
            0 => ry * rz,
            1 => rx * rz,
            _ => rx * ry,
        }
    }

    /// Does the cell sit on the outer faces of the sample? A single-plane grid only checks x and y.
    pub fn is_boundary_cell(&self, index: usize) -> bool {
        let [x, y, z] = self.cell_of_index(index);
        let [nx, ny, nz] = self.dims;
        let on_xy = x == 0 || x + 1 == nx || y == 0 || y + 1 == ny;
        if nz == 1 {
            on_xy
        } else {
            on_xy || z == 0 || z + 1 == nz
        }
    }

    /// Cells whose centres fall inside `shape` placed at `centroid`, sorted and unique.
    ///
    /// Periodic grids wrap the search box and shift the wrapped cell centres by one sample
    /// length; bounded grids clip it.
    pub fn rasterize(&self, shape: &GrainShape, centroid: &Vector3<f64>) -> Vec<usize> {
        let reach = shape.bounding_radius();
        let size = self.size();
        let center = self.cell_of_point(centroid);
        let mut ranges = [(0i64, 0i64); 3];
        for axis in 0..3 {
            let n = self.dims[axis] as i64;
            let half = (reach / self.resolution[axis]) as i64 + 1;
            let (lo, hi) = (center[axis] - half, center[axis] + half);
            ranges[axis] = if self.boundary.is_periodic() {
                (lo.max(-n), hi.min(2 * n - 1))
            } else {
                (lo.max(0), hi.min(n - 1))
            };
        }

        let mut cells = Vec::new();
        for k in ranges[2].0..=ranges[2].1 {
            let (pz, sz) = wrap(k, self.dims[2], size[2]);
            for j in ranges[1].0..=ranges[1].1 {
                let (py, sy) = wrap(j, self.dims[1], size[1]);
                for i in ranges[0].0..=ranges[0].1 {
                    let (px, sx) = wrap(i, self.dims[0], size[0]);
                    let point = self.cell_center([px, py, pz]) + Vector3::new(sx, sy, sz);
                    if shape.contains_offset(&(point - centroid)) {
                        cells.push(self.index([px, py, pz]));
                    }
                }
            }
        }
        cells.sort_unstable();
        cells.dedup();
        cells
    }
}

// Wrapped index and the coordinate shift of its image
fn wrap(i: i64, n: usize, length: f64) -> (usize, f64) {
    let n = n as i64;
    if i < 0 {
        ((i + n) as usize, -length)
    } else if i >= n {
        ((i - n) as usize, length)
    } else {
        (i as usize, 0.0)
    }
}
