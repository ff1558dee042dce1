//! Version - one edit of a chronology
//!
//! A version references its stamp by sequence and carries a payload. The
//! commit core treats payloads as opaque except for description versions,
//! whose required fields are checked before commit.

use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::nid::Nid;
use crate::stamp::StampSequence;

/// Whether a version is pending, committed, or canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommitState {
    Uncommitted,
    Committed,
    Canceled,
}

/// Fields of a description version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionData {
    pub text: String,
    pub language: Option<Nid>,
    pub case_significance: Option<Nid>,
    pub description_type: Option<Nid>,
}

impl DescriptionData {
    /// Names of required fields that are unset.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.text.trim().is_empty() {
            missing.push("text");
        }
        if self.language.is_none() {
            missing.push("language");
        }
        if self.case_significance.is_none() {
            missing.push("case_significance");
        }
        if self.description_type.is_none() {
            missing.push("description_type");
        }
        missing
    }
}

/// Payload of a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum VersionData {
    /// A concept version carries no fields beyond its stamp.
    Concept,
    Description(DescriptionData),
    /// Any other semantic payload, encoded by its owner.
    Opaque(Vec<u8>),
}

const DATA_CONCEPT: u8 = 0;
const DATA_DESCRIPTION: u8 = 1;
const DATA_OPAQUE: u8 = 2;

impl VersionData {
    pub fn is_description(&self) -> bool {
        matches!(self, VersionData::Description(_))
    }

    /// SHA-256 over the binary encoding. Two versions with the same stamp
    /// tuple and digest carry the same content.
    pub fn content_digest(&self) -> [u8; 32] {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut buf);
        Sha256::digest(&buf).into()
    }

    /// Format:
    /// - kind (u8)
    /// - Description: text (u32 len + UTF-8), then language, case
    ///   significance, description type, each as (u8 present, i32)
    /// - Opaque: bytes (u32 len + bytes)
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            VersionData::Concept => writer.write_all(&[DATA_CONCEPT]),
            VersionData::Description(d) => {
                writer.write_all(&[DATA_DESCRIPTION])?;
                writer.write_all(&(d.text.len() as u32).to_le_bytes())?;
                writer.write_all(d.text.as_bytes())?;
                for field in [d.language, d.case_significance, d.description_type] {
                    write_optional_nid(writer, field)?;
                }
                Ok(())
            }
            VersionData::Opaque(bytes) => {
                writer.write_all(&[DATA_OPAQUE])?;
                writer.write_all(&(bytes.len() as u32).to_le_bytes())?;
                writer.write_all(bytes)
            }
        }
    }

    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut kind = [0u8; 1];
        reader.read_exact(&mut kind)?;
        match kind[0] {
            DATA_CONCEPT => Ok(VersionData::Concept),
            DATA_DESCRIPTION => {
                let text = read_bytes(reader)?;
                let text = String::from_utf8(text).map_err(|e| {
                    io::Error::new(io::ErrorKind::InvalidData, format!("Invalid UTF-8: {}", e))
                })?;
                let language = read_optional_nid(reader)?;
                let case_significance = read_optional_nid(reader)?;
                let description_type = read_optional_nid(reader)?;
                Ok(VersionData::Description(DescriptionData {
                    text,
                    language,
                    case_significance,
                    description_type,
                }))
            }
            DATA_OPAQUE => Ok(VersionData::Opaque(read_bytes(reader)?)),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid version data kind: {}", other),
            )),
        }
    }
}

fn write_optional_nid<W: Write>(writer: &mut W, nid: Option<Nid>) -> io::Result<()> {
    match nid {
        Some(nid) => {
            writer.write_all(&[1])?;
            writer.write_all(&nid.to_le_bytes())
        }
        None => {
            writer.write_all(&[0])?;
            writer.write_all(&0i32.to_le_bytes())
        }
    }
}

fn read_optional_nid<R: Read>(reader: &mut R) -> io::Result<Option<Nid>> {
    let mut flag = [0u8; 1];
    reader.read_exact(&mut flag)?;
    let mut nid = [0u8; 4];
    reader.read_exact(&mut nid)?;
    Ok((flag[0] != 0).then(|| i32::from_le_bytes(nid)))
}

fn read_bytes<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;
    // Grows with the bytes actually present, not with the stated length.
    let mut buf = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("Payload length {} exceeds available {} bytes", len, buf.len()),
        ));
    }
    Ok(buf)
}

/// A single version of a chronology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub stamp_sequence: StampSequence,
    pub commit_state: CommitState,
    pub data: VersionData,
}

impl Version {
    /// A new pending version.
    pub fn uncommitted(stamp_sequence: StampSequence, data: VersionData) -> Self {
        Self {
            stamp_sequence,
            commit_state: CommitState::Uncommitted,
            data,
        }
    }

    pub fn committed(stamp_sequence: StampSequence, data: VersionData) -> Self {
        Self {
            stamp_sequence,
            commit_state: CommitState::Committed,
            data,
        }
    }

    #[inline]
    pub fn is_uncommitted(&self) -> bool {
        self.commit_state == CommitState::Uncommitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description() -> DescriptionData {
        DescriptionData {
            text: "Myocardial infarction".into(),
            language: Some(-100),
            case_significance: Some(-101),
            description_type: Some(-102),
        }
    }

    #[test]
    fn test_complete_description_has_no_missing_fields() {
        assert!(description().missing_fields().is_empty());
    }

    #[test]
    fn test_missing_fields_reported() {
        let d = DescriptionData {
            text: "  ".into(),
            language: None,
            ..description()
        };
        assert_eq!(d.missing_fields(), vec!["text", "language"]);
    }

    #[test]
    fn test_binary_form_each_kind() {
        for data in [
            VersionData::Concept,
            VersionData::Description(description()),
            VersionData::Description(DescriptionData::default()),
            VersionData::Opaque(vec![1, 2, 3]),
        ] {
            let mut buf = Vec::new();
            data.write_to(&mut buf).unwrap();
            assert_eq!(VersionData::read_from(&mut buf.as_slice()).unwrap(), data);
        }
    }

    #[test]
    fn test_invalid_kind_rejected() {
        let buf = [9u8];
        assert!(VersionData::read_from(&mut buf.as_slice()).is_err());
    }

    #[test]
    fn test_payload_length_beyond_input_rejected() {
        let mut buf = vec![DATA_OPAQUE];
        buf.extend_from_slice(&u32::MAX.to_le_bytes());
        buf.extend_from_slice(&[1, 2, 3]);
        let err = VersionData::read_from(&mut buf.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_digest_tracks_content() {
        let a = VersionData::Opaque(vec![1, 2, 3]);
        let b = VersionData::Opaque(vec![1, 2, 4]);
        assert_eq!(a.content_digest(), a.clone().content_digest());
        assert_ne!(a.content_digest(), b.content_digest());
    }
}
