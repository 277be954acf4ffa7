use crate::adapter::{Crosshair, RenderSurface, TileOrientation};
use crate::error::{Result, ViewerError};
use crate::state::AnatomicalAxis;

pub const DEFAULT_STEP_SIZE: f32 = 0.05;

/// Turns wheel input over a 2-D tile into a one-axis crosshair step. Scroll
/// deltas use the DOM sign convention: positive means the wheel moved down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceNavigator {
    step_size: f32,
    invert_scroll: bool,
}

impl Default for SliceNavigator {
    fn default() -> Self {
        Self {
            step_size: DEFAULT_STEP_SIZE,
            invert_scroll: false,
        }
    }
}

impl SliceNavigator {
    pub fn new(step_size: f32, invert_scroll: bool) -> Result<Self> {
        if !step_size.is_finite() || step_size <= 0.0 || step_size > 1.0 {
            return Err(ViewerError::invalid(format!(
                "slice step {step_size} must be in (0, 1]"
            )));
        }
        Ok(Self {
            step_size,
            invert_scroll,
        })
    }

    pub fn step_size(&self) -> f32 {
        self.step_size
    }

    pub fn invert_scroll(&self) -> bool {
        self.invert_scroll
    }

    pub fn set_invert_scroll(&mut self, invert_scroll: bool) {
        self.invert_scroll = invert_scroll;
    }

    pub fn axis_for(orientation: TileOrientation) -> Option<usize> {
        let anatomical = match orientation {
            TileOrientation::Axial => AnatomicalAxis::Axial,
            TileOrientation::Coronal => AnatomicalAxis::Coronal,
            TileOrientation::Sagittal => AnatomicalAxis::Sagittal,
            TileOrientation::Render => return None,
        };
        Some(anatomical.spatial_axis())
    }

    pub fn direction(&self, scroll_delta: f32) -> f32 {
        let direction = if scroll_delta < 0.0 { -1.0 } else { 1.0 };
        if self.invert_scroll {
            -direction
        } else {
            direction
        }
    }

    pub fn step(&self, crosshair: Crosshair, axis: usize, scroll_delta: f32) -> Crosshair {
        let mut next = crosshair;
        if let Some(coord) = next.get_mut(axis) {
            *coord = (*coord + self.direction(scroll_delta) * self.step_size).clamp(0.0, 1.0);
        }
        next
    }

    /// Returns the new crosshair, or `None` when the pointer is outside every
    /// tile or over the 3-D render.
    pub fn handle_wheel<S: RenderSurface + ?Sized>(
        &self,
        surface: &mut S,
        x: f32,
        y: f32,
        scroll_delta: f32,
    ) -> Option<Crosshair> {
        let tile = surface.resolve_tile_at(x, y)?;
        let orientation = surface.tile_orientation(tile)?;
        let axis = Self::axis_for(orientation)?;

        let next = self.step(surface.crosshair(), axis, scroll_delta);
        surface.set_crosshair(next);
        surface.redraw();
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::testing::{FakeSurface, SurfaceCall};

    #[test]
    fn sagittal_scroll_up_steps_x_down() {
        let mut surface = FakeSurface::with_volumes([10, 10, 10], 1);
        surface.crosshair = [0.4, 0.5, 0.6];
        let (x, y) = FakeSurface::tile_center(TileOrientation::Sagittal);

        let next = SliceNavigator::default()
            .handle_wheel(&mut surface, x, y, -120.0)
            .expect("sagittal tile should respond to wheel");

        assert_relative_eq!(next[0], 0.35, epsilon = 1e-6);
        assert_eq!(next[1], 0.5);
        assert_eq!(next[2], 0.6);
        assert_eq!(surface.crosshair, next);
        assert_eq!(surface.calls.last(), Some(&SurfaceCall::Redraw));
    }

    #[test]
    fn each_tile_moves_its_own_axis() {
        let navigator = SliceNavigator::default();
        for (orientation, axis) in [
            (TileOrientation::Axial, 2),
            (TileOrientation::Coronal, 1),
            (TileOrientation::Sagittal, 0),
        ] {
            let mut surface = FakeSurface::with_volumes([10, 10, 10], 1);
            let (x, y) = FakeSurface::tile_center(orientation);
            let next = navigator
                .handle_wheel(&mut surface, x, y, 3.0)
                .expect("2-D tile should respond to wheel");
            for other in 0..3 {
                if other == axis {
                    assert_relative_eq!(next[other], 0.55, epsilon = 1e-6);
                } else {
                    assert_eq!(next[other], 0.5);
                }
            }
        }
    }

    #[test]
    fn render_tile_and_gaps_ignore_wheel() {
        let navigator = SliceNavigator::default();
        let mut surface = FakeSurface::with_volumes([10, 10, 10], 1);
        surface.crosshair = [0.2, 0.3, 0.4];
        let (x, y) = FakeSurface::tile_center(TileOrientation::Render);

        for delta in [-500.0, -1.0, 1.0, 500.0] {
            assert_eq!(navigator.handle_wheel(&mut surface, x, y, delta), None);
        }
        assert_eq!(navigator.handle_wheel(&mut surface, -5.0, 20.0, 1.0), None);
        assert_eq!(surface.crosshair, [0.2, 0.3, 0.4]);
        assert!(surface.calls.is_empty());
    }

    #[test]
    fn repeated_scroll_clamps_at_both_ends() {
        let navigator = SliceNavigator::new(0.3, false).expect("valid step");
        let mut surface = FakeSurface::with_volumes([10, 10, 10], 1);
        let (x, y) = FakeSurface::tile_center(TileOrientation::Axial);

        for _ in 0..20 {
            navigator.handle_wheel(&mut surface, x, y, 1.0e6);
            assert!((0.0..=1.0).contains(&surface.crosshair[2]));
        }
        assert_eq!(surface.crosshair[2], 1.0);

        for _ in 0..20 {
            navigator.handle_wheel(&mut surface, x, y, -1.0e6);
            assert!((0.0..=1.0).contains(&surface.crosshair[2]));
        }
        assert_eq!(surface.crosshair[2], 0.0);
    }

    #[test]
    fn invert_scroll_flips_direction() {
        let mut navigator = SliceNavigator::default();
        assert_eq!(navigator.direction(-1.0), -1.0);
        assert_eq!(navigator.direction(0.0), 1.0);

        navigator.set_invert_scroll(true);
        assert_eq!(navigator.direction(-1.0), 1.0);
        let next = navigator.step([0.5, 0.5, 0.5], 1, 2.0);
        assert_relative_eq!(next[1], 0.45, epsilon = 1e-6);
    }

    #[test]
    fn step_size_must_be_a_fraction() {
        assert!(SliceNavigator::new(0.0, false).is_err());
        assert!(SliceNavigator::new(-0.1, false).is_err());
        assert!(SliceNavigator::new(1.5, false).is_err());
        assert!(SliceNavigator::new(f32::NAN, false).is_err());
        assert_eq!(
            SliceNavigator::new(1.0, true).map(|navigator| navigator.step_size()),
            Ok(1.0)
        );
    }
}
