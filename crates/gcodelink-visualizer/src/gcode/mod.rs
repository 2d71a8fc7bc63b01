//! G-Code parsing for preview
//!
//! This module provides:
//! - Motion waypoint extraction from instruction text
//! - Toolpath summary over the extracted waypoints

pub mod parser;
pub mod preview;

pub use parser::{parse_file, parse_line, parse_str, MotionCommand, Waypoint};
pub use preview::{Bounds, PathPreview, PreviewPoint};
