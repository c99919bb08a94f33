//! Artifact identity: collision-resistant base names and date-partitioned storage keys.

use std::fmt;

use rand::TryRngCore;
use rand::rngs::OsRng;
use thiserror::Error;
use time::{Date, OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

pub const MIN_SUFFIX_BYTES: usize = 2;
pub const MAX_SUFFIX_BYTES: usize = 4;

const PARTITION_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

#[derive(Debug, Error)]
pub enum NamingError {
    #[error("random source unavailable: {0}")]
    RandomSource(String),
    #[error("invalid report identifier `{id}`: {reason}")]
    InvalidIdentifier { id: String, reason: &'static str },
    #[error("suffix length {0} is outside the supported range")]
    SuffixLength(usize),
    #[error("`{0}` is not an artifact key")]
    InvalidKey(String),
}

/// Source of cryptographically strong random bytes.
pub trait EntropySource: Send + Sync + fmt::Debug {
    fn fill(&self, buf: &mut [u8]) -> Result<(), NamingError>;
}

/// Operating-system CSPRNG. Stateless, so one instance may be shared freely.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<(), NamingError> {
        let mut rng = OsRng;
        rng.try_fill_bytes(buf)
            .map_err(|err| NamingError::RandomSource(err.to_string()))
    }
}

/// Hex suffix drawn from `source`, two characters per byte.
pub fn random_suffix(source: &dyn EntropySource, bytes: usize) -> Result<String, NamingError> {
    if !(MIN_SUFFIX_BYTES..=MAX_SUFFIX_BYTES).contains(&bytes) {
        return Err(NamingError::SuffixLength(bytes));
    }
    let mut buf = [0u8; MAX_SUFFIX_BYTES];
    source.fill(&mut buf[..bytes])?;
    Ok(hex::encode(&buf[..bytes]))
}

/// Reject identifiers that could escape their date partition.
pub fn validate_identifier(id: &str) -> Result<(), NamingError> {
    let reason = if id == "." || id == ".." {
        Some("relative path components are not allowed")
    } else if id.contains(['/', '\\']) {
        Some("path separators are not allowed")
    } else if id.chars().any(char::is_control) {
        Some("control characters are not allowed")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(NamingError::InvalidIdentifier {
            id: id.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Base name used for every artifact of one publish.
///
/// Forced documents keep their identifier verbatim so a known artifact can be
/// overwritten; everything else gets a fresh random suffix.
pub fn derive_base_name(
    id: &str,
    force: bool,
    source: &dyn EntropySource,
    suffix_bytes: usize,
) -> Result<String, NamingError> {
    validate_identifier(id)?;

    if force {
        if id.is_empty() {
            return Err(NamingError::InvalidIdentifier {
                id: String::new(),
                reason: "forced publishes require an identifier",
            });
        }
        return Ok(id.to_string());
    }

    let suffix = random_suffix(source, suffix_bytes)?;
    if id.is_empty() {
        Ok(suffix)
    } else {
        Ok(format!("{id}-{suffix}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Html,
    Json,
    Pdf,
}

impl ArtifactKind {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Html => "html",
            ArtifactKind::Json => "json",
            ArtifactKind::Pdf => "pdf",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ArtifactKind::Html => "text/html; charset=UTF-8",
            ArtifactKind::Json => "application/json; charset=UTF-8",
            ArtifactKind::Pdf => "application/pdf",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Storage key of the form `<YYYY-MM-DD>/<stem>.<ext>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKey {
    partition: Date,
    stem: String,
    kind: ArtifactKind,
}

impl ArtifactKey {
    pub fn new(partition: Date, stem: impl Into<String>, kind: ArtifactKind) -> Self {
        Self {
            partition,
            stem: stem.into(),
            kind,
        }
    }

    /// Partition for a publish: today in UTC, or the document's own date when forced.
    pub fn partition_for(force: bool, document_date: Option<OffsetDateTime>) -> Date {
        match (force, document_date) {
            (true, Some(date)) => date.to_offset(time::UtcOffset::UTC).date(),
            _ => OffsetDateTime::now_utc().date(),
        }
    }

    /// Parse a key previously produced by [`ArtifactKey::new`].
    pub fn parse(key: &str) -> Result<Self, NamingError> {
        let invalid = || NamingError::InvalidKey(key.to_string());

        let (partition, file) = key.split_once('/').ok_or_else(invalid)?;
        let partition = Date::parse(partition, PARTITION_FORMAT).map_err(|_| invalid())?;
        let (stem, extension) = file.rsplit_once('.').ok_or_else(invalid)?;
        if stem.is_empty() {
            return Err(invalid());
        }
        validate_identifier(stem).map_err(|_| invalid())?;

        let kind = match extension {
            "html" => ArtifactKind::Html,
            "json" => ArtifactKind::Json,
            "pdf" => ArtifactKind::Pdf,
            _ => return Err(invalid()),
        };

        Ok(Self::new(partition, stem, kind))
    }

    pub fn partition(&self) -> Date {
        self.partition
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// Sibling key in the same partition with a different stem and kind.
    pub fn sibling(&self, stem: impl Into<String>, kind: ArtifactKind) -> Self {
        Self::new(self.partition, stem, kind)
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let partition = self
            .partition
            .format(PARTITION_FORMAT)
            .map_err(|_| fmt::Error)?;
        write!(f, "{partition}/{}.{}", self.stem, self.kind.extension())
    }
}
