//! Planar calibration pattern geometry and the canonical target model.
//!
//! The target model is the ordered list of feature points in target-local
//! coordinates. Correspondence with detected image points is positional, so the
//! ordering here (row `i` outer, column `j` inner) has to match the detector's
//! output ordering exactly.

use std::{ops::Deref, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{Pt2, Pt3, Real};

/// Kind of planar calibration pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Inner chessboard corners.
    Chessboard,
    /// Asymmetric (staggered) circle grid.
    AsymmetricCircles,
    /// Symmetric circle grid.
    SymmetricCircles,
}

impl PatternKind {
    /// Map the numeric pattern-type convention (`0`, `1`, `2`) used by dataset tools.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Chessboard),
            1 => Some(Self::AsymmetricCircles),
            2 => Some(Self::SymmetricCircles),
            _ => None,
        }
    }

    /// Whether odd rows are shifted by one pitch.
    pub fn is_staggered(self) -> bool {
        matches!(self, Self::AsymmetricCircles)
    }
}

/// Immutable description of a planar target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternGeometry {
    /// Feature points per row.
    pub columns: usize,
    /// Number of rows.
    pub rows: usize,
    /// Pitch between neighbouring features, in target units.
    pub square_size: Real,
    /// Staggered (asymmetric circle) layout.
    pub staggered: bool,
}

impl PatternGeometry {
    pub fn new(columns: usize, rows: usize, square_size: Real, kind: PatternKind) -> Self {
        Self {
            columns,
            rows,
            square_size,
            staggered: kind.is_staggered(),
        }
    }

    /// Number of feature points on the target.
    pub fn num_points(&self) -> usize {
        self.columns * self.rows
    }

    /// Generate the target points on the `Z = 0` plane.
    ///
    /// Point `(i, j)` (row, column) lands at
    /// - staggered: `((2j + i mod 2) * s, i * s, 0)`,
    /// - regular: `(j * s, i * s, 0)`.
    pub fn target_points(&self) -> Vec<Pt3> {
        let s = self.square_size;
        let mut points = Vec::with_capacity(self.num_points());
        for i in 0..self.rows {
            for j in 0..self.columns {
                let x = if self.staggered {
                    (2 * j + i % 2) as Real * s
                } else {
                    j as Real * s
                };
                points.push(Pt3::new(x, i as Real * s, 0.0));
            }
        }
        points
    }
}

/// Shared, immutable target model.
///
/// Cloning is cheap; all views of a run reference the same point buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetModel {
    points: Arc<[Pt3]>,
}

impl TargetModel {
    /// Build the model for a pattern geometry.
    pub fn from_geometry(geometry: &PatternGeometry) -> Self {
        Self::from_points(geometry.target_points())
    }

    /// Wrap an explicit list of target points.
    pub fn from_points(points: Vec<Pt3>) -> Self {
        Self {
            points: points.into(),
        }
    }

    pub fn points(&self) -> &[Pt3] {
        &self.points
    }

    /// Planar `(x, y)` coordinates, used by homography estimation.
    pub fn planar_points(&self) -> Vec<Pt2> {
        self.points.iter().map(|p| Pt2::new(p.x, p.y)).collect()
    }

    /// Whether every point lies on `Z = 0`.
    pub fn is_planar(&self) -> bool {
        self.points.iter().all(|p| p.z.abs() < 1e-12)
    }
}

impl Deref for TargetModel {
    type Target = [Pt3];

    fn deref(&self) -> &[Pt3] {
        &self.points
    }
}

impl Serialize for TargetModel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.points.iter().map(|p| [p.x, p.y, p.z]))
    }
}

impl<'de> Deserialize<'de> for TargetModel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Vec::<[Real; 3]>::deserialize(deserializer)?;
        Ok(Self::from_points(
            raw.into_iter().map(|[x, y, z]| Pt3::new(x, y, z)).collect(),
        ))
    }
}
