//! Extrusion flow math.
//!
//! Converts desired extrusion dimensions (width, height) into volumetric
//! material flow (mm³/mm of travel). The cross-section of an extruded thread
//! is a rectangle with semicircular ends:
//!
//! ```text
//! area = height × (width - height × (1 - π/4))
//! ```
//!
//! which is NOT simply `width × height` - that would give ~10-15% error.
//! The resulting rate is the input the autospeed calculator works from, and
//! it feeds the per-region summary lines of the output preamble.

use std::f64::consts::PI;
use thiserror::Error;

/// Flow calculation errors.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Flow calculation produced a non-positive value.
    #[error("flow produced non-positive cross-section; is extrusion width too small?")]
    NegativeFlow,

    /// Invalid argument provided.
    #[error("invalid flow argument: {0}")]
    InvalidArgument(String),
}

/// Result type for flow calculations.
pub type FlowResult<T> = Result<T, FlowError>;

/// Flow parameters for extrusion.
///
/// # Invariants
///
/// - For non-bridge flow: `width >= height`
/// - For bridge flow: `width == height` (circular cross-section)
/// - All dimensions are in millimeters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flow {
    /// Extrusion width (mm). For bridges: thread diameter.
    width: f64,

    /// Extrusion height (mm). For bridges: same as width.
    height: f64,

    /// Whether this is a bridging flow.
    bridge: bool,
}

impl Flow {
    /// Create a new Flow for non-bridge extrusion.
    pub fn new(width: f64, height: f64) -> FlowResult<Self> {
        if width <= 0.0 || height <= 0.0 {
            return Err(FlowError::InvalidArgument(
                "flow width and height must be positive".to_string(),
            ));
        }
        Ok(Self {
            width,
            height,
            bridge: false,
        })
    }

    /// Create a bridging flow.
    ///
    /// Bridge extrusions have a circular cross-section because unsupported
    /// filament naturally forms a round thread.
    pub fn bridging_flow(diameter: f64) -> Self {
        Self {
            width: diameter,
            height: diameter,
            bridge: true,
        }
    }

    /// Get the extrusion width (mm).
    #[inline]
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Get the extrusion height / layer height (mm).
    #[inline]
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Check if this is a bridging flow.
    #[inline]
    pub fn is_bridge(&self) -> bool {
        self.bridge
    }

    /// Return a copy with the height replaced.
    ///
    /// The skirt reuses one configured flow across layers of differing
    /// heights, rewriting the height per layer.
    pub fn with_height(&self, height: f64) -> Self {
        Self { height, ..*self }
    }

    /// Volumetric flow per unit of travel (mm³/mm).
    pub fn mm3_per_mm(&self) -> FlowResult<f64> {
        let area = if self.bridge {
            (self.width / 2.0).powi(2) * PI
        } else {
            self.height * (self.width - self.height * (1.0 - PI / 4.0))
        };
        if area <= 0.0 {
            return Err(FlowError::NegativeFlow);
        }
        Ok(area)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_flow_cross_section() {
        let flow = Flow::new(0.45, 0.2).unwrap();
        let expected = 0.2 * (0.45 - 0.2 * (1.0 - PI / 4.0));
        assert_relative_eq!(flow.mm3_per_mm().unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_bridge_flow_is_circular() {
        let flow = Flow::bridging_flow(0.4);
        assert_relative_eq!(flow.mm3_per_mm().unwrap(), 0.2 * 0.2 * PI, epsilon = 1e-12);
    }

    #[test]
    fn test_with_height_keeps_width() {
        let flow = Flow::new(0.5, 0.3).unwrap().with_height(0.15);
        assert_eq!(flow.width(), 0.5);
        assert_eq!(flow.height(), 0.15);
    }

    #[test]
    fn test_invalid_dimensions_rejected() {
        assert!(Flow::new(0.0, 0.2).is_err());
        assert!(Flow::new(0.45, -1.0).is_err());
    }
}
