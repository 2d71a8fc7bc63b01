//! Jog command encoding
//!
//! Maps an operator jog intent to the exact G-code lines sent to the
//! controller. The table in [`encode`] is the only place these strings live.

use gcodelink_core::Error;
use std::fmt;
use std::str::FromStr;

/// Manual motion request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JogDirection {
    /// Relative 2mm step, `X2`
    Left,
    /// Relative 2mm step, `X-2`
    Right,
    /// Relative 2mm step, `Y2`
    Up,
    /// Relative 2mm step, `Y-2`
    Down,
    /// Lift Z, go to XY origin, lower Z
    ReturnToZero,
    /// Make the current position the work origin
    SetZero,
}

impl JogDirection {
    /// Every direction, in code order
    pub const ALL: [JogDirection; 6] = [
        JogDirection::Left,
        JogDirection::Right,
        JogDirection::Up,
        JogDirection::Down,
        JogDirection::ReturnToZero,
        JogDirection::SetZero,
    ];

    /// External numeric code used by operator panels
    pub fn code(&self) -> u32 {
        match self {
            Self::Left => 1001,
            Self::Right => 1002,
            Self::Up => 1003,
            Self::Down => 1004,
            Self::ReturnToZero => 1005,
            Self::SetZero => 1006,
        }
    }

    /// Direction for a numeric code
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.code() == code)
    }

    /// Name accepted by [`FromStr`]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Up => "up",
            Self::Down => "down",
            Self::ReturnToZero => "return-to-zero",
            Self::SetZero => "set-zero",
        }
    }
}

impl TryFrom<u32> for JogDirection {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(Error::UnknownJogCode { code })
    }
}

impl FromStr for JogDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        if let Ok(code) = wanted.parse::<u32>() {
            return Self::try_from(code);
        }
        Self::ALL
            .into_iter()
            .find(|d| d.name() == wanted)
            .ok_or_else(|| Error::other(format!("Unknown jog direction '{}'", s)))
    }
}

impl fmt::Display for JogDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered lines produced for one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCommand(Vec<String>);

impl EncodedCommand {
    /// Forward a caller-supplied instruction unmodified
    pub fn pass_through(raw: impl Into<String>) -> Self {
        Self(vec![raw.into()])
    }

    /// Lines in send order
    pub fn lines(&self) -> &[String] {
        &self.0
    }

    /// Iterate lines in send order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of lines
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no lines
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<EncodedCommand> for Vec<String> {
    fn from(cmd: EncodedCommand) -> Self {
        cmd.0
    }
}

/// G-code for a jog direction
pub fn encode(direction: JogDirection) -> EncodedCommand {
    let lines: &[&str] = match direction {
        JogDirection::Left => &["G21G91G1X2F100"],
        JogDirection::Right => &["G21G91G1X-2F100"],
        JogDirection::Up => &["G21G91G1Y2F100"],
        JogDirection::Down => &["G21G91G1Y-2F100"],
        JogDirection::SetZero => &["G10 P0 L20 X0 Y0 Z0"],
        JogDirection::ReturnToZero => &["G21G90 G0Z5", "G90 G0 X0 Y0", "G90 G0 Z0"],
    };
    EncodedCommand(lines.iter().map(|s| s.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_table() {
        let table: [(JogDirection, &[&str]); 6] = [
            (JogDirection::Left, &["G21G91G1X2F100"]),
            (JogDirection::Right, &["G21G91G1X-2F100"]),
            (JogDirection::Up, &["G21G91G1Y2F100"]),
            (JogDirection::Down, &["G21G91G1Y-2F100"]),
            (
                JogDirection::ReturnToZero,
                &["G21G90 G0Z5", "G90 G0 X0 Y0", "G90 G0 Z0"],
            ),
            (JogDirection::SetZero, &["G10 P0 L20 X0 Y0 Z0"]),
        ];
        for (direction, expected) in table {
            assert_eq!(encode(direction).lines(), expected, "{}", direction);
        }
    }

    #[test]
    fn test_codes() {
        let codes: Vec<u32> = JogDirection::ALL.iter().map(|d| d.code()).collect();
        assert_eq!(codes, vec![1001, 1002, 1003, 1004, 1005, 1006]);
        assert_eq!(JogDirection::from_code(1005), Some(JogDirection::ReturnToZero));
        assert_eq!(JogDirection::from_code(1000), None);
        assert!(matches!(
            JogDirection::try_from(42),
            Err(Error::UnknownJogCode { code: 42 })
        ));
    }

    #[test]
    fn test_parse_names_and_codes() {
        assert_eq!("left".parse::<JogDirection>().unwrap(), JogDirection::Left);
        assert_eq!(
            "Return_To_Zero".parse::<JogDirection>().unwrap(),
            JogDirection::ReturnToZero
        );
        assert_eq!("1006".parse::<JogDirection>().unwrap(), JogDirection::SetZero);
        assert!("sideways".parse::<JogDirection>().is_err());
        assert_eq!(JogDirection::SetZero.to_string(), "set-zero");
    }

    #[test]
    fn test_pass_through_is_unmodified() {
        let cmd = EncodedCommand::pass_through("$H ; home");
        assert_eq!(cmd.iter().collect::<Vec<_>>(), vec!["$H ; home"]);
        assert_eq!(cmd.len(), 1);
    }
}
