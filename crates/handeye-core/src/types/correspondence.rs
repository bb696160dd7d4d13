use serde::{Deserialize, Serialize};

use crate::{CalibError, CalibResult, ImageSize, Pt2, Pt3, TargetModel, ViewTag};

/// Detected target projections of one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDetections {
    pub tag: ViewTag,
    pub image_size: ImageSize,
    /// Pixel positions, index-aligned with the target model.
    pub points: Vec<Pt2>,
}

impl ImageDetections {
    pub fn new(tag: ViewTag, image_size: ImageSize, points: Vec<Pt2>) -> Self {
        Self {
            tag,
            image_size,
            points,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// The shared target model paired with every view's detections.
///
/// This is the unit of work consumed by the intrinsics solver.
///
/// # Example
///
/// ```
/// use handeye_core::{
///     CorrespondenceSet, ImageDetections, ImageSize, PatternGeometry, PatternKind, Pt2,
///     TargetModel, ViewTag,
/// };
///
/// let model = TargetModel::from_geometry(&PatternGeometry::new(2, 1, 0.1, PatternKind::Chessboard));
/// let view = ImageDetections::new(
///     ViewTag::positional(0, "0.png"),
///     ImageSize::new(640, 480),
///     vec![Pt2::new(10.0, 10.0), Pt2::new(20.0, 10.0)],
/// );
/// let set = CorrespondenceSet::new(model, vec![view]).unwrap();
/// assert_eq!(set.num_views(), 1);
/// assert_eq!(set.pairs(0).count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct CorrespondenceSet {
    model: TargetModel,
    views: Vec<ImageDetections>,
}

impl CorrespondenceSet {
    /// Pair detections with the model.
    ///
    /// # Errors
    ///
    /// [`CalibError::CorrespondenceLengthMismatch`] if any view does not carry
    /// exactly one image point per model point.
    pub fn new(model: TargetModel, views: Vec<ImageDetections>) -> CalibResult<Self> {
        for (view, det) in views.iter().enumerate() {
            if det.len() != model.len() {
                return Err(CalibError::CorrespondenceLengthMismatch {
                    view,
                    expected: model.len(),
                    found: det.len(),
                });
            }
        }
        Ok(Self { model, views })
    }

    pub fn model(&self) -> &TargetModel {
        &self.model
    }

    pub fn num_views(&self) -> usize {
        self.views.len()
    }

    pub fn views(&self) -> &[ImageDetections] {
        &self.views
    }

    pub fn view(&self, idx: usize) -> &ImageDetections {
        &self.views[idx]
    }

    /// `(model point, image point)` pairs of one view.
    pub fn pairs(&self, idx: usize) -> impl Iterator<Item = (&Pt3, &Pt2)> + '_ {
        self.model.iter().zip(self.views[idx].points.iter())
    }

    /// Common image size of all views.
    ///
    /// # Errors
    ///
    /// [`CalibError::DegenerateGeometry`] if views disagree on the size or the
    /// set is empty.
    pub fn image_size(&self) -> CalibResult<ImageSize> {
        let first = self
            .views
            .first()
            .ok_or_else(|| CalibError::degenerate("no views to take an image size from"))?;
        for det in &self.views[1..] {
            if det.image_size != first.image_size {
                return Err(CalibError::degenerate(format!(
                    "image size of {} ({}x{}) differs from {} ({}x{})",
                    det.tag,
                    det.image_size.width,
                    det.image_size.height,
                    first.tag,
                    first.image_size.width,
                    first.image_size.height
                )));
            }
        }
        Ok(first.image_size)
    }

    /// Give back the detections, e.g. to hand them to record assembly.
    pub fn into_views(self) -> Vec<ImageDetections> {
        self.views
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PatternGeometry, PatternKind};

    fn model() -> TargetModel {
        TargetModel::from_geometry(&PatternGeometry::new(3, 2, 1.0, PatternKind::Chessboard))
    }

    fn detections(index: usize, n: usize, size: ImageSize) -> ImageDetections {
        ImageDetections::new(
            ViewTag::positional(index, format!("{index}.png")),
            size,
            (0..n).map(|i| Pt2::new(i as f64, 0.0)).collect(),
        )
    }

    #[test]
    fn rejects_length_mismatch() {
        let size = ImageSize::new(640, 480);
        let err = CorrespondenceSet::new(
            model(),
            vec![detections(0, 6, size), detections(1, 5, size)],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CalibError::CorrespondenceLengthMismatch {
                view: 1,
                expected: 6,
                found: 5
            }
        ));
    }

    #[test]
    fn pairs_are_positional() {
        let set = CorrespondenceSet::new(model(), vec![detections(0, 6, ImageSize::new(8, 8))])
            .unwrap();
        let pairs: Vec<_> = set.pairs(0).collect();
        assert_eq!(pairs.len(), 6);
        assert_eq!(*pairs[4].0, Pt3::new(1.0, 1.0, 0.0));
        assert_eq!(*pairs[4].1, Pt2::new(4.0, 0.0));
    }

    #[test]
    fn image_size_must_agree() {
        let set = CorrespondenceSet::new(
            model(),
            vec![
                detections(0, 6, ImageSize::new(640, 480)),
                detections(1, 6, ImageSize::new(640, 482)),
            ],
        )
        .unwrap();
        assert!(matches!(
            set.image_size(),
            Err(CalibError::DegenerateGeometry { .. })
        ));
    }
}
