use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::types::ArtifactError;

/// The magic number that identifies model artifacts
pub const ARTIFACT_MAGIC: u32 = 0x4D42_4154; // "TABM" in ASCII

/// File extension used for artifacts on disk and on the artifact server
pub const ARTIFACT_EXTENSION: &str = "tabm";

/// Read a length-prefixed UTF-8 string.
///
/// `remaining` bounds the length so a corrupt prefix cannot trigger a huge
/// allocation.
pub fn read_string<R: Read>(reader: &mut R, remaining: u64) -> Result<String, ArtifactError> {
    let bytes = read_bytes(reader, remaining)?;
    String::from_utf8(bytes)
        .map_err(|e| ArtifactError::InvalidFormat(format!("Invalid UTF-8 in string: {}", e)))
}

/// Read a length-prefixed byte block.
pub fn read_bytes<R: Read>(reader: &mut R, remaining: u64) -> Result<Vec<u8>, ArtifactError> {
    let len = reader.read_u64::<LittleEndian>()?;
    if len > remaining {
        return Err(ArtifactError::InvalidFormat(format!(
            "Length prefix {} exceeds the {} bytes left",
            len, remaining
        )));
    }
    let mut buffer = vec![0u8; len as usize];
    reader.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Write a length-prefixed UTF-8 string
pub fn write_string<W: Write>(writer: &mut W, value: &str) -> Result<(), ArtifactError> {
    write_bytes(writer, value.as_bytes())
}

/// Write a length-prefixed byte block
pub fn write_bytes<W: Write>(writer: &mut W, value: &[u8]) -> Result<(), ArtifactError> {
    writer.write_u64::<LittleEndian>(value.len() as u64)?;
    writer.write_all(value)?;
    Ok(())
}

/// Checks if a file at the given path is a model artifact by verifying its magic number.
///
/// # Arguments
///
/// * `path` - Path to the file to check
///
/// # Returns
///
/// `true` if the file exists and starts with the artifact magic number, `false` otherwise
pub fn is_artifact_file<P: AsRef<Path>>(path: P) -> bool {
    if let Ok(mut file) = File::open(path) {
        if let Ok(magic) = file.read_u32::<LittleEndian>() {
            return magic == ARTIFACT_MAGIC;
        }
    }
    false
}
