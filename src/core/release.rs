//! Release commit messages
//!
//! Publishing callers describe what they released as
//! `group:artifact:version`; the commit message is
//! `Release group:artifact:version`.

use std::fmt;
use std::str::FromStr;

use crate::error::MirrorError;

/// Coordinates of a released artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseCoordinates {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

impl ReleaseCoordinates {
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            version: version.into(),
        }
    }

    /// Commit message announcing this release
    pub fn commit_message(&self) -> String {
        format!("Release {}", self)
    }
}

impl fmt::Display for ReleaseCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
    }
}

impl FromStr for ReleaseCoordinates {
    type Err = MirrorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        match parts.as_slice() {
            [group, artifact, version]
                if !group.is_empty() && !artifact.is_empty() && !version.is_empty() =>
            {
                Ok(Self::new(*group, *artifact, *version))
            }
            _ => Err(MirrorError::Config(format!(
                "Invalid release '{}'. Expected GROUP:ARTIFACT:VERSION",
                s
            ))),
        }
    }
}
