use std::fs::File;
use std::io::{Cursor, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, Utc};
use memmap2::Mmap;
use tracing::{debug, info};

use super::artifact_utils::{self, ARTIFACT_MAGIC};
use super::types::ArtifactError;
use crate::estimator::{Classifier, Estimator};

/// Current version of the artifact layout
pub const ARTIFACT_VERSION: u32 = 1;

/// A fitted estimator together with the schema it was fit on.
///
/// On disk and over the wire an artifact is a little-endian header followed
/// by the estimator payload:
///
/// ```text
/// u32 magic ("TABM")  u32 version
/// str kind            i64 trained_at (unix seconds)
/// u64 n_features      n_features × str
/// u64 payload_len     payload (JSON estimator)
/// ```
///
/// Strings and the payload are u64 length-prefixed.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    /// Estimator kind, mirrors `Estimator::kind`
    pub kind: String,
    /// When the estimator was fit
    pub trained_at: DateTime<Utc>,
    /// Column names, in the order the estimator expects them
    pub feature_names: Vec<String>,
    /// The fitted estimator
    pub estimator: Estimator,
}

impl ModelArtifact {
    /// Wraps a fitted estimator, stamping it with the current time.
    pub fn new(feature_names: Vec<String>, estimator: Estimator) -> Self {
        Self {
            kind: estimator.kind().to_string(),
            trained_at: Utc::now(),
            feature_names,
            estimator,
        }
    }

    /// Decodes an artifact from an in-memory buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let total = bytes.len() as u64;
        let mut cursor = Cursor::new(bytes);

        let magic = cursor.read_u32::<LittleEndian>()?;
        if magic != ARTIFACT_MAGIC {
            return Err(ArtifactError::InvalidFormat(format!("Invalid magic number {:#010x}", magic)));
        }

        let version = cursor.read_u32::<LittleEndian>()?;
        if version != ARTIFACT_VERSION {
            return Err(ArtifactError::UnsupportedVersion(version));
        }

        let remaining = total - cursor.position();
        let kind = artifact_utils::read_string(&mut cursor, remaining)?;
        let trained_at_secs = cursor.read_i64::<LittleEndian>()?;
        let trained_at = DateTime::<Utc>::from_timestamp(trained_at_secs, 0).ok_or_else(|| {
            ArtifactError::InvalidFormat(format!("Invalid training timestamp {}", trained_at_secs))
        })?;

        let n_features = cursor.read_u64::<LittleEndian>()?;
        // Every name needs at least its 8-byte prefix.
        if n_features > (total - cursor.position()) / 8 {
            return Err(ArtifactError::InvalidFormat(format!(
                "Feature count {} does not fit in the artifact",
                n_features
            )));
        }
        let mut feature_names = Vec::with_capacity(n_features as usize);
        for _ in 0..n_features {
            let remaining = total - cursor.position();
            feature_names.push(artifact_utils::read_string(&mut cursor, remaining)?);
        }

        let remaining = total - cursor.position();
        let payload = artifact_utils::read_bytes(&mut cursor, remaining)?;
        if cursor.position() != total {
            return Err(ArtifactError::InvalidFormat(format!(
                "{} trailing bytes after the payload",
                total - cursor.position()
            )));
        }

        let estimator: Estimator = serde_json::from_slice(&payload)?;
        if estimator.kind() != kind {
            return Err(ArtifactError::InvalidFormat(format!(
                "Header kind '{}' does not match payload kind '{}'",
                kind,
                estimator.kind()
            )));
        }
        if !estimator.is_fitted() {
            return Err(ArtifactError::Payload("estimator is not fitted".into()));
        }
        if estimator.n_features() != feature_names.len() {
            return Err(ArtifactError::InvalidFormat(format!(
                "Header lists {} features but the estimator expects {}",
                feature_names.len(),
                estimator.n_features()
            )));
        }
        estimator.validate().map_err(ArtifactError::InvalidFormat)?;

        debug!("Decoded {} artifact with {} features", kind, feature_names.len());
        Ok(Self { kind, trained_at, feature_names, estimator })
    }

    /// Encodes the artifact into a buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        let payload = serde_json::to_vec(&self.estimator)?;

        let mut buffer = Vec::with_capacity(payload.len() + 64);
        buffer.write_u32::<LittleEndian>(ARTIFACT_MAGIC)?;
        buffer.write_u32::<LittleEndian>(ARTIFACT_VERSION)?;
        artifact_utils::write_string(&mut buffer, &self.kind)?;
        buffer.write_i64::<LittleEndian>(self.trained_at.timestamp())?;
        buffer.write_u64::<LittleEndian>(self.feature_names.len() as u64)?;
        for name in &self.feature_names {
            artifact_utils::write_string(&mut buffer, name)?;
        }
        artifact_utils::write_bytes(&mut buffer, &payload)?;
        Ok(buffer)
    }

    /// Reads an artifact file through a memory map.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, ArtifactError> {
        let file = File::open(path.as_ref())?;
        // SAFETY: the map is read-only and dropped before this function returns.
        let data = unsafe { Mmap::map(&file)? };
        Self::from_bytes(&data)
    }

    /// Writes the artifact to `path`, replacing any existing file.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), ArtifactError> {
        let bytes = self.to_bytes()?;
        let mut file = File::create(path.as_ref())?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        info!("Wrote {} artifact ({} bytes) to {}", self.kind, bytes.len(), path.as_ref().display());
        Ok(())
    }
}
