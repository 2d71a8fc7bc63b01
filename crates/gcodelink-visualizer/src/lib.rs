//! # GCodeLink Visualizer
//!
//! Instruction-file parsing for GCodeLink. Turns G-code text into motion
//! waypoints and summarises the resulting toolpath for preview.

pub mod gcode;

pub use gcode::{
    parse_file, parse_line, parse_str, Bounds, MotionCommand, PathPreview, PreviewPoint, Waypoint,
};
