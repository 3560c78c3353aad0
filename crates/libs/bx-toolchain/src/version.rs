//! Four-component tool versions as printed by engine editors.

use std::fmt;

use crate::prelude::*;

/// Characters that separate version components, e.g. `2021.3.10f1`.
const VERSION_SEPARATORS: [char; 4] = ['.', 'f', 'b', 'a'];

/// A `major.minor.patch.build` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ToolVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub build: u32,
}

impl ToolVersion {
    pub const fn new(major: u32, minor: u32, patch: u32, build: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            build,
        }
    }

    /// Parse a single version token such as `2021.3.10f1` or `6000.0.1.3`.
    pub fn parse(token: &str) -> Result<Self> {
        let components = token
            .trim()
            .splitn(4, VERSION_SEPARATORS)
            .map(|component| component.parse::<u32>())
            .collect::<core::result::Result<Vec<_>, _>>()
            .map_err(|_| Error::InvalidVersion(token.to_string()))?;

        match components[..] {
            [major, minor, patch, build] => Ok(Self::new(major, minor, patch, build)),
            _ => Err(Error::InvalidVersion(token.to_string())),
        }
    }

    /// Find the version in a tool's `-version` output.
    ///
    /// The first version-shaped token whose components are all integers wins.
    /// Shaped tokens that do not parse are skipped; if nothing parses, the
    /// first of them is reported.
    pub fn from_output<I, S>(lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut invalid = None;
        for line in lines {
            for token in version_tokens(line.as_ref()) {
                match Self::parse(token) {
                    Ok(version) => return Ok(version),
                    Err(err) => {
                        invalid.get_or_insert(err);
                    }
                }
            }
        }
        Err(invalid.unwrap_or_else(|| {
            Error::InvalidVersion(String::from(
                "no line of the tool output contains a version",
            ))
        }))
    }
}

/// A token looks like a version when it starts with a digit, has two or three
/// dots and splits into exactly four components.
fn version_tokens(line: &str) -> impl Iterator<Item = &str> {
    line.split_whitespace().filter(|token| {
        let dots = token.matches('.').count();
        token.starts_with(|c: char| c.is_ascii_digit())
            && (2..=3).contains(&dots)
            && token.split(VERSION_SEPARATORS).count() == 4
    })
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.patch, self.build
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_release_suffix() {
        let version = ToolVersion::from_output(["2021.3.10f1 (abcdef123456)"]).unwrap();
        assert_eq!(version, ToolVersion::new(2021, 3, 10, 1));
    }

    #[test]
    fn parses_beta_alpha_and_dotted() {
        assert_eq!(
            ToolVersion::parse("2023.1.0b12").unwrap(),
            ToolVersion::new(2023, 1, 0, 12)
        );
        assert_eq!(
            ToolVersion::parse("2022.2.0a7").unwrap(),
            ToolVersion::new(2022, 2, 0, 7)
        );
        assert_eq!(
            ToolVersion::parse("6000.0.23.1").unwrap(),
            ToolVersion::new(6000, 0, 23, 1)
        );
    }

    #[test]
    fn skips_noise_lines() {
        let output = [
            "Loading editor...",
            "[Licensing::Module] channel 1.0 ready",
            "2020.3.48f1",
            "4.5.6.7",
        ];
        assert_eq!(
            ToolVersion::from_output(output).unwrap(),
            ToolVersion::new(2020, 3, 48, 1)
        );
    }

    #[test]
    fn fails_without_version_line() {
        let err = ToolVersion::from_output(["no version here", "1.2"]).unwrap_err();
        assert!(matches!(err, Error::InvalidVersion(_)));
    }

    #[test]
    fn fails_on_non_integer_component() {
        let err = ToolVersion::from_output(["2021.3.1x0f1"]).unwrap_err();
        assert!(matches!(err, Error::InvalidVersion(ref v) if v == "2021.3.1x0f1"));
    }

    #[test]
    fn skips_unparsable_candidates() {
        let output = ["Build 2021.3.1x0f1 starting", "2021.3.10f1 (abcdef123456)"];
        assert_eq!(
            ToolVersion::from_output(output).unwrap(),
            ToolVersion::new(2021, 3, 10, 1)
        );
        assert_eq!(
            ToolVersion::from_output(["9.9.9x9f1 2022.1.5f1"]).unwrap(),
            ToolVersion::new(2022, 1, 5, 1)
        );
    }

    #[test]
    fn orders_and_displays() {
        assert!(ToolVersion::new(2021, 3, 10, 1) > ToolVersion::new(2021, 2, 99, 9));
        assert_eq!(ToolVersion::new(2021, 3, 10, 1).to_string(), "2021.3.10.1");
    }
}
