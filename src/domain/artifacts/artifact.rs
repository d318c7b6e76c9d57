use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Plugins and themes are managed identically; the kind only selects connector endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Plugin,
    Theme,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Plugin, ArtifactKind::Theme];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Plugin => "plugin",
            ArtifactKind::Theme => "theme",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plugin" => Ok(ArtifactKind::Plugin),
            "theme" => Ok(ArtifactKind::Theme),
            other => anyhow::bail!("unknown artifact kind: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub id: Uuid,
    pub kind: ArtifactKind,
    pub slug: String,
    pub name: String,
    /// Registered from a site listing rather than uploaded to the platform.
    pub is_external: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRelease {
    pub artifact_id: Uuid,
    pub version: String,
    pub file_url: String,
}

/// Picks the newest release by [`compare_versions`].
pub fn latest_release(releases: &[ArtifactRelease]) -> Option<&ArtifactRelease> {
    releases
        .iter()
        .max_by(|a, b| compare_versions(&a.version, &b.version))
}

/// Orders WordPress-style version strings numerically. Missing components count as zero, so
/// `5.10 > 5.9` and `6.1 > 6.0.1`. Strings that still do not parse sort below parseable ones
/// and lexically among themselves.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (lenient_version(a), lenient_version(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// `2.0` and `2.0.0` name the same release.
pub fn same_version(a: &str, b: &str) -> bool {
    compare_versions(a, b) == Ordering::Equal
}

fn lenient_version(raw: &str) -> Option<semver::Version> {
    let raw = raw.trim().trim_start_matches(['v', 'V']);
    let (core, suffix) = raw.split_at(raw.find(['-', '+']).unwrap_or(raw.len()));
    let mut parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3 {
        return None;
    }
    parts.resize(3, "0");
    semver::Version::parse(&format!("{}{suffix}", parts.join("."))).ok()
}
