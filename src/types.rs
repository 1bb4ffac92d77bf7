use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::Error;

/// Opaque bearer credential issued by the backend after a code exchange.
///
/// Guaranteed non-empty by construction. `Debug` only shows a masked form,
/// so a token never lands in logs by accident.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidToken`] if the string is empty or whitespace.
    pub fn new(token: impl Into<String>) -> Result<Self, Error> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::InvalidToken);
        }
        Ok(Self(token))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First and last four characters, for log lines.
    #[must_use]
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 12 {
            return "****".into();
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AccessToken").field(&self.masked()).finish()
    }
}

impl TryFrom<String> for AccessToken {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl std::str::FromStr for AccessToken {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Backend repository identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct RepoId(pub i64);

/// Backend scan report identifier (UUID string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct ReportId(pub String);

/// Navigation target handed back to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, From, Into)]
pub struct Route(pub String);

impl Route {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Route {
    fn from(path: &str) -> Self {
        Self(path.to_owned())
    }
}

/// A repository owned by the signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawRepository")]
pub struct Repository {
    pub id: RepoId,
    pub name: String,
    pub is_private: bool,
    pub url: String,
    /// Whether the repository is enrolled for scanning.
    pub active: bool,
    /// Reports embedded in the listing, when the backend includes them.
    pub reports: Vec<ScanReport>,
}

// The backend's own schema uses `clone_url`; GitHub-shaped payloads carry
// `private` plus several URL fields at once.
#[derive(Deserialize)]
struct RawRepository {
    id: RepoId,
    name: String,
    #[serde(default)]
    private: Option<bool>,
    #[serde(default)]
    is_private: Option<bool>,
    #[serde(default)]
    clone_url: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default = "default_active")]
    active: bool,
    #[serde(default)]
    reports: Vec<ScanReport>,
}

fn default_active() -> bool {
    true
}

impl From<RawRepository> for Repository {
    fn from(raw: RawRepository) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            is_private: raw.is_private.or(raw.private).unwrap_or(false),
            url: raw
                .clone_url
                .or(raw.html_url)
                .or(raw.url)
                .unwrap_or_default(),
            active: raw.active,
            reports: raw.reports,
        }
    }
}

/// Request body for enrolling a repository for scanning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRepository {
    pub name: String,
    pub clone_url: String,
}

impl NewRepository {
    #[must_use]
    pub fn new(name: impl Into<String>, clone_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clone_url: clone_url.into(),
        }
    }
}

/// Result of one security scan of a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub id: ReportId,
    #[serde(rename = "dns_exfil_found")]
    pub dns_exfiltration_detected: bool,
    #[serde(rename = "ssrf_found")]
    pub ssrf_risk_detected: bool,
    #[serde(with = "timestamp")]
    pub timestamp: OffsetDateTime,
    /// Generated PDF artifact. `None` means no download link may be offered.
    #[serde(default)]
    pub pdf_path: Option<String>,
}

impl ScanReport {
    /// Number of detection flags raised by this report.
    #[must_use]
    pub fn finding_count(&self) -> u32 {
        u32::from(self.dns_exfiltration_detected) + u32::from(self.ssrf_risk_detected)
    }

    #[must_use]
    pub fn has_artifact(&self) -> bool {
        self.pdf_path.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// Outcome of the most recent scan, as shown on a repository card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum ScanStatus {
    Clean,
    Vulnerable,
    Unknown,
}

/// Derived display state of a repository. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RepositoryActivationState {
    pub active: bool,
    pub last_scan_status: ScanStatus,
    pub vulnerability_count: u32,
}

impl RepositoryActivationState {
    /// Derive card state from a repository and its reports.
    ///
    /// The newest report decides the status; each raised detection flag
    /// counts as one vulnerability.
    #[must_use]
    pub fn derive(repository: &Repository, reports: &[ScanReport]) -> Self {
        let latest = reports.iter().max_by_key(|r| r.timestamp);
        let (last_scan_status, vulnerability_count) = match latest {
            None => (ScanStatus::Unknown, 0),
            Some(report) => match report.finding_count() {
                0 => (ScanStatus::Clean, 0),
                n => (ScanStatus::Vulnerable, n),
            },
        };
        Self {
            active: repository.active,
            last_scan_status,
            vulnerability_count,
        }
    }
}

/// Accepts RFC 3339 as well as offset-less ISO 8601, which the backend
/// emits for its UTC timestamps.
mod timestamp {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::format_description::well_known::Rfc3339;
    use time::macros::format_description;
    use time::{OffsetDateTime, PrimitiveDateTime};

    pub(super) fn serialize<S: Serializer>(
        value: &OffsetDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let formatted = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<OffsetDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse(raw: &str) -> Result<OffsetDateTime, time::error::Parse> {
        if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
            return Ok(value);
        }
        let naive = format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
        );
        PrimitiveDateTime::parse(raw, naive).map(PrimitiveDateTime::assume_utc)
    }
}
