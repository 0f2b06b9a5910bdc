//! Canvas size inference.

use serde::{Deserialize, Serialize};

use crate::{
    codec::node::{Node, NodeKind},
    error::FigparseError,
};

/// Used when nothing in the tree carries geometry.
pub const DEFAULT_CANVAS: CanvasSize = CanvasSize {
    width: 1920.0,
    height: 1080.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl CanvasSize {
    pub fn new(width: f64, height: f64) -> Self {
        CanvasSize { width, height }
    }
}

/// Infers the overall design surface of a DOCUMENT-rooted tree.
///
/// The first direct CANVAS child with geometry wins outright. Failing that, the result is the
/// furthest right and bottom edge of any node with geometry, root included, measured from an
/// origin of (0, 0). When neither edge reaches past the origin the tree gets [`DEFAULT_CANVAS`].
pub fn canvas_dimensions(root: &Node, max_depth: usize) -> Result<CanvasSize, FigparseError> {
    if root.kind != NodeKind::Document {
        return Err(FigparseError::InvalidRoot(root.kind.to_string()));
    }

    if let Some(bbox) = root
        .children
        .iter()
        .filter(|child| child.kind == NodeKind::Canvas)
        .find_map(|canvas| canvas.absolute_bounding_box)
    {
        tracing::debug!(
            "[canvas_dimensions] using canvas geometry {}x{}",
            bbox.width,
            bbox.height
        );
        return Ok(CanvasSize::new(bbox.width, bbox.height));
    }

    // The extent starts at the origin.
    let mut extent = CanvasSize::new(0.0, 0.0);
    for visit in root.pre_order(max_depth) {
        let (_, node) = visit?;
        if let Some(bbox) = node.absolute_bounding_box {
            extent.width = extent.width.max(bbox.max_x());
            extent.height = extent.height.max(bbox.max_y());
        }
    }

    if extent.width == 0.0 && extent.height == 0.0 {
        tracing::debug!("[canvas_dimensions] no geometry past the origin, using default canvas");
        return Ok(DEFAULT_CANVAS);
    }
    tracing::debug!(
        "[canvas_dimensions] no canvas geometry, using node extent {}x{}",
        extent.width,
        extent.height
    );
    Ok(extent)
}
