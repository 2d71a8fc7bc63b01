//! Toolpath summary for preview
//!
//! Resolves waypoints into absolute XY points and measures the path. A
//! waypoint that omits an axis keeps that axis from the previous point; the
//! path starts at the origin.

use super::parser::{MotionCommand, Waypoint};
use serde::{Deserialize, Serialize};

/// Axis-aligned extent of the resolved points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    fn at(x: f64, y: f64) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    fn include(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Extent along X
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Extent along Y
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Waypoint with both axes resolved
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreviewPoint {
    pub command: MotionCommand,
    pub x: f64,
    pub y: f64,
}

/// Summary of a parsed program
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathPreview {
    /// Resolved points in program order
    pub points: Vec<PreviewPoint>,
    /// Extent of `points`; `None` for an empty program
    pub bounds: Option<Bounds>,
    /// Total G0 travel
    pub rapid_distance: f64,
    /// Total G1 travel
    pub cut_distance: f64,
    /// Number of G0 waypoints
    pub rapid_moves: usize,
    /// Number of G1 waypoints
    pub cut_moves: usize,
}

impl PathPreview {
    /// Build a preview from parsed waypoints
    pub fn from_waypoints(waypoints: &[Waypoint]) -> Self {
        let mut preview = PathPreview::default();
        let (mut x, mut y) = (0.0_f64, 0.0_f64);

        for waypoint in waypoints {
            let next_x = waypoint.x.unwrap_or(x);
            let next_y = waypoint.y.unwrap_or(y);
            let length = (next_x - x).hypot(next_y - y);

            match waypoint.command {
                MotionCommand::G0 => {
                    preview.rapid_moves += 1;
                    preview.rapid_distance += length;
                }
                MotionCommand::G1 => {
                    preview.cut_moves += 1;
                    preview.cut_distance += length;
                }
            }

            match preview.bounds.as_mut() {
                Some(bounds) => bounds.include(next_x, next_y),
                None => preview.bounds = Some(Bounds::at(next_x, next_y)),
            }
            preview.points.push(PreviewPoint {
                command: waypoint.command,
                x: next_x,
                y: next_y,
            });

            x = next_x;
            y = next_y;
        }

        preview
    }

    /// Total travel of both kinds
    pub fn total_distance(&self) -> f64 {
        self.rapid_distance + self.cut_distance
    }

    /// Whether the program has no motion
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_program() {
        let preview = PathPreview::from_waypoints(&[]);
        assert!(preview.is_empty());
        assert_eq!(preview.bounds, None);
        assert_eq!(preview.total_distance(), 0.0);
    }

    #[test]
    fn test_missing_axes_carry_forward() {
        let waypoints = [
            Waypoint::new(MotionCommand::G0, Some(3.0), Some(4.0)),
            Waypoint::new(MotionCommand::G1, None, Some(10.0)),
            Waypoint::new(MotionCommand::G1, Some(-2.0), None),
        ];
        let preview = PathPreview::from_waypoints(&waypoints);

        let resolved: Vec<(f64, f64)> = preview.points.iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(resolved, vec![(3.0, 4.0), (3.0, 10.0), (-2.0, 10.0)]);
        assert_eq!(preview.rapid_moves, 1);
        assert_eq!(preview.cut_moves, 2);
        assert!((preview.rapid_distance - 5.0).abs() < 1e-9);
        assert!((preview.cut_distance - 11.0).abs() < 1e-9);
        assert_eq!(
            preview.bounds,
            Some(Bounds {
                min_x: -2.0,
                min_y: 4.0,
                max_x: 3.0,
                max_y: 10.0,
            })
        );
    }
}
