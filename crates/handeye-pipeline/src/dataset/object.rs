use std::collections::HashMap;
use std::path::Path;

use handeye_core::{CalibError, CalibResult, PatternGeometry, PatternKind, Real};

use super::file_name;

/// Chessboard description from a Tabb `calibration_object.txt`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TabbObject {
    /// Inner corners per row.
    pub chess_width: usize,
    /// Inner corner rows.
    pub chess_height: usize,
    /// Square edge length in millimeters.
    pub square_mm: Real,
}

impl TabbObject {
    pub fn geometry(&self) -> PatternGeometry {
        PatternGeometry::new(
            self.chess_width,
            self.chess_height,
            self.square_mm,
            PatternKind::Chessboard,
        )
    }

    /// Parse `key value` lines. Unknown keys are ignored.
    pub fn parse(text: &str, source_name: &str) -> CalibResult<Self> {
        let mut values: HashMap<&str, Real> = HashMap::new();
        for line in text.lines() {
            let mut fields = line.split_whitespace();
            let (Some(key), Some(value)) = (fields.next(), fields.next()) else {
                continue;
            };
            let value = value.parse::<Real>().map_err(|_| {
                CalibError::input_format(source_name, format!("value of {key} is not a number"))
            })?;
            values.insert(key, value);
        }

        let get = |key: &str| {
            values
                .get(key)
                .copied()
                .ok_or_else(|| CalibError::input_format(source_name, format!("missing {key}")))
        };
        let count = |key: &str| -> CalibResult<usize> {
            let v = get(key)?;
            if v < 1.0 || v.fract() != 0.0 {
                return Err(CalibError::input_format(
                    source_name,
                    format!("{key} must be a positive integer, got {v}"),
                ));
            }
            Ok(v as usize)
        };

        let chess_width = count("chess_width")?;
        let chess_height = count("chess_height")?;
        let mm_width = get("chess_mm_width")?;
        let mm_height = get("chess_mm_height")?;
        if mm_width != mm_height {
            return Err(CalibError::input_format(
                source_name,
                format!("non-square chessboard cells ({mm_width} x {mm_height} mm)"),
            ));
        }
        if mm_width <= 0.0 {
            return Err(CalibError::input_format(
                source_name,
                "square size must be positive",
            ));
        }
        Ok(Self {
            chess_width,
            chess_height,
            square_mm: mm_width,
        })
    }
}

/// Read a Tabb `calibration_object.txt`.
pub fn read_tabb_object(path: &Path) -> CalibResult<TabbObject> {
    let text = std::fs::read_to_string(path).map_err(|e| CalibError::io(path, e))?;
    TabbObject::parse(&text, file_name(path).unwrap_or("calibration_object.txt"))
}
