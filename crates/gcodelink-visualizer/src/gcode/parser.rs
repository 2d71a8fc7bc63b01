//! G-Code motion parser
//!
//! Extracts `G0`/`G1` waypoints from instruction text for preview. The
//! grammar is deliberately small: a motion word, then an optional `X` and an
//! optional `Y`, in that order. Anything else is skipped, never reported.

use gcodelink_core::FileError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::OnceLock;

/// Motion word of a waypoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotionCommand {
    /// Rapid positioning
    G0,
    /// Linear feed move
    G1,
}

impl MotionCommand {
    /// Whether this is a rapid move
    pub fn is_rapid(&self) -> bool {
        matches!(self, MotionCommand::G0)
    }
}

impl fmt::Display for MotionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionCommand::G0 => write!(f, "G0"),
            MotionCommand::G1 => write!(f, "G1"),
        }
    }
}

/// One parsed motion line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Motion word
    pub command: MotionCommand,
    /// Target X, if the line gave one
    pub x: Option<f64>,
    /// Target Y, if the line gave one
    pub y: Option<f64>,
}

impl Waypoint {
    /// Create a waypoint
    pub fn new(command: MotionCommand, x: Option<f64>, y: Option<f64>) -> Self {
        Self { command, x, y }
    }
}

fn motion_regex() -> &'static Regex {
    static MOTION_REGEX: OnceLock<Regex> = OnceLock::new();
    MOTION_REGEX.get_or_init(|| {
        Regex::new(
            r"^(G[01])(?:\s*X([+-]?\d+(?:\.\d*)?))?(?:\s*Y([+-]?\d+(?:\.\d*)?))?(?:\s|[A-Z]|$)",
        )
        .expect("invalid regex pattern")
    })
}

/// Parse one line
///
/// The line is cut at the first `;` and trimmed. Returns `None` for blank
/// lines and for anything that is not a `G0`/`G1` motion.
pub fn parse_line(line: &str) -> Option<Waypoint> {
    let code = match line.find(';') {
        Some(pos) => &line[..pos],
        None => line,
    }
    .trim();
    if code.is_empty() {
        return None;
    }

    let caps = motion_regex().captures(code)?;
    let command = match &caps[1] {
        "G0" => MotionCommand::G0,
        _ => MotionCommand::G1,
    };
    let coord = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<f64>().ok());

    Some(Waypoint::new(command, coord(2), coord(3)))
}

/// Parse every line of `text`
pub fn parse_str(text: &str) -> Vec<Waypoint> {
    text.lines().filter_map(parse_line).collect()
}

/// Parse an instruction file
///
/// The file is read one line at a time, so large programs are never held in
/// memory whole. Invalid UTF-8 is replaced rather than rejected.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Vec<Waypoint>, FileError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| FileError::from_io(path, &e))?;
    let mut reader = BufReader::new(file);

    let mut waypoints = Vec::new();
    let mut buf = Vec::new();
    let mut lines = 0usize;
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| FileError::from_io(path, &e))?;
        if n == 0 {
            break;
        }
        lines += 1;
        if let Some(waypoint) = parse_line(&String::from_utf8_lossy(&buf)) {
            waypoints.push(waypoint);
        }
    }

    tracing::debug!(
        "Parsed {} waypoints from {} lines of {}",
        waypoints.len(),
        lines,
        path.display()
    );
    Ok(waypoints)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wp(command: MotionCommand, x: Option<f64>, y: Option<f64>) -> Waypoint {
        Waypoint::new(command, x, y)
    }

    #[test]
    fn test_reference_program() {
        let parsed = parse_str("G1 X10 Y20 ; move\nG0 X-5\nnotacommand\n");
        assert_eq!(
            parsed,
            vec![
                wp(MotionCommand::G1, Some(10.0), Some(20.0)),
                wp(MotionCommand::G0, Some(-5.0), None),
            ]
        );
    }

    #[test]
    fn test_coordinates_are_optional() {
        assert_eq!(parse_line("G0"), Some(wp(MotionCommand::G0, None, None)));
        assert_eq!(
            parse_line("G1 Y-2.5"),
            Some(wp(MotionCommand::G1, None, Some(-2.5)))
        );
        assert_eq!(
            parse_line("G1X3.Y+4"),
            Some(wp(MotionCommand::G1, Some(3.0), Some(4.0)))
        );
    }

    #[test]
    fn test_trailing_words_allowed() {
        assert_eq!(
            parse_line("  G1 X1.5 Y2 F300  "),
            Some(wp(MotionCommand::G1, Some(1.5), Some(2.0)))
        );
        assert_eq!(
            parse_line("G21G91G1X2F100"),
            None,
            "motion word must lead the line"
        );
    }

    #[test]
    fn test_non_motion_lines_skipped() {
        for line in [
            "",
            "   ",
            "; only a comment",
            "G10 P0 L20 X0 Y0 Z0",
            "G01 X1",
            "g1 x1",
            "M3 S1000",
            "G2 X1 Y1 I1 J0",
            "(header)",
        ] {
            assert_eq!(parse_line(line), None, "{:?}", line);
        }
    }

    #[test]
    fn test_comment_cuts_coordinates() {
        assert_eq!(
            parse_line("G0 ;X5 Y5"),
            Some(wp(MotionCommand::G0, None, None))
        );
    }
}
