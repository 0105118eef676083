//! Labeled feature-point (marker) files.
//!
//! One file per training image, suffix `-fpts.txt`. The header line holds
//! the point count and the base-resolution domain the coordinates refer to;
//! each following line is one marker:
//!
//! ```text
//! n xsize ysize zsize
//! x y label id          (2D mode)
//! x y z label id        (3D mode)
//! ```
//!
//! Label 0 is background, label 1 is object. Coordinates are converted to a
//! 0-based linear index at the base resolution (x-fastest), which is how the
//! rest of the crate addresses markers.

use std::fs;
use std::path::Path;

use crate::error::{FlimError, Result};

/// One supervised point: base-resolution linear index, class label and the
/// id of the drawn marker it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub elem: usize,
    pub label: i32,
    pub id: i32,
}

/// Coordinate count expected per marker line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    TwoD,
    ThreeD,
}

impl ReadMode {
    pub fn for_image_3d(is_3d: bool) -> ReadMode {
        if is_3d {
            ReadMode::ThreeD
        } else {
            ReadMode::TwoD
        }
    }

    fn ncoords(self) -> usize {
        match self {
            ReadMode::TwoD => 2,
            ReadMode::ThreeD => 3,
        }
    }
}

/// Reads a feature-point file. An empty point set is an error: a model
/// cannot be estimated for that image.
pub fn read_labeled_points(path: impl AsRef<Path>, mode: ReadMode) -> Result<Vec<Marker>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| FlimError::io(path, e))?;
    let malformed = |reason: String| FlimError::MalformedMarkerFile {
        path: path.to_path_buf(),
        reason,
    };

    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| malformed("empty file".to_string()))?;
    let head: Vec<usize> = header
        .split_whitespace()
        .map(|t| t.parse::<usize>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| malformed(format!("bad header {:?}: {}", header, e)))?;
    if head.len() != 4 {
        return Err(malformed(format!(
            "header must be `n xsize ysize zsize`, got {:?}",
            header
        )));
    }
    let (n, xsize, ysize) = (head[0], head[1], head[2]);

    let mut markers = Vec::with_capacity(n);
    for line in lines {
        let tokens: Vec<i64> = line
            .split_whitespace()
            .map(|t| t.parse::<i64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| malformed(format!("bad marker line {:?}: {}", line, e)))?;
        if tokens.len() != mode.ncoords() + 2 {
            return Err(malformed(format!(
                "expected {} fields per marker, got {:?}",
                mode.ncoords() + 2,
                line
            )));
        }
        let (x, y, z) = match mode {
            ReadMode::TwoD => (tokens[0], tokens[1], 0),
            ReadMode::ThreeD => (tokens[0], tokens[1], tokens[2]),
        };
        let (label, id) = (
            tokens[mode.ncoords()] as i32,
            tokens[mode.ncoords() + 1] as i32,
        );
        let elem = x as usize + y as usize * xsize + z as usize * xsize * ysize;
        markers.push(Marker { elem, label, id });
    }

    if markers.len() != n {
        return Err(malformed(format!(
            "header announces {} markers, file holds {}",
            n,
            markers.len()
        )));
    }
    if markers.is_empty() {
        return Err(FlimError::EmptyMarkerSet {
            path: path.to_path_buf(),
        });
    }
    Ok(markers)
}
