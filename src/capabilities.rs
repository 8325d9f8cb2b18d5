use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    str::FromStr,
};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlatformVersion {
    pub major: u32,
    pub minor: u32,
}

impl PlatformVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Version assumed when the host reports something unparseable.
    pub const BASELINE: PlatformVersion = PlatformVersion::new(6, 0);
}

impl fmt::Display for PlatformVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid platform version '{0}'")]
pub struct InvalidVersion(String);

impl FromStr for PlatformVersion {
    type Err = InvalidVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidVersion(s.to_string());
        let mut parts = s.trim().split('.');
        let major = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        let minor = match parts.next() {
            Some(p) => p.parse().map_err(|_| invalid())?,
            None => 0,
        };
        // patch components are accepted and ignored
        if parts.any(|p| p.parse::<u32>().is_err()) {
            return Err(invalid());
        }
        Ok(Self { major, minor })
    }
}

/// What the host platform supports, computed once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlatformCapabilities {
    pub version: Option<PlatformVersion>,
    pub back_button: bool,
    pub haptic_feedback: bool,
    pub header_color: bool,
    pub invoices: bool,
    pub cloud_storage: bool,
    pub biometric: bool,
    /// Exactly 6.0: the app runs with reduced features.
    pub limited: bool,
    /// Older than 6.0.
    pub needs_update: bool,
}

impl PlatformCapabilities {
    const FEATURES: PlatformVersion = PlatformVersion::new(6, 1);
    const CLOUD_STORAGE: PlatformVersion = PlatformVersion::new(6, 9);
    const BIOMETRIC: PlatformVersion = PlatformVersion::new(7, 2);

    /// `None` means no host platform, so nothing is available.
    pub fn detect(version: Option<&str>) -> Self {
        let Some(raw) = version else {
            return Self::default();
        };
        let version = raw.parse().unwrap_or_else(|err| {
            tracing::warn!(%err, "assuming baseline platform version");
            PlatformVersion::BASELINE
        });
        Self::for_version(version)
    }

    pub fn for_version(version: PlatformVersion) -> Self {
        let features = version >= Self::FEATURES;
        Self {
            version: Some(version),
            back_button: features,
            haptic_feedback: features,
            header_color: features,
            invoices: features,
            cloud_storage: version >= Self::CLOUD_STORAGE,
            biometric: version >= Self::BIOMETRIC,
            limited: version == PlatformVersion::BASELINE,
            needs_update: version < PlatformVersion::BASELINE,
        }
    }

    pub fn has_host(&self) -> bool {
        self.version.is_some()
    }
}
