//! Changeset frames
//!
//! Each frame in a `.ibdf` segment is:
//! - Frame Length (u32 LE), total length including this field
//! - Frame Kind (u8): COMMIT / CHRONOLOGY
//! - Body (variable)
//! - Checksum (u32 LE) over length and body
//!
//! A commit is written as one COMMIT frame followed by one CHRONOLOGY frame
//! per affected chronology. Chronology frames carry full stamp tuples, not
//! sequences, so a segment can be replayed into any datastore.

use std::io::{self, Cursor, Read, Write};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::checksum::compute_checksum;
use crate::chronology::{CommitState, VersionData};
use crate::nid::{Nid, ObjectType};
use crate::stamp::{Stamp, Status};

/// Length field plus kind byte plus checksum.
pub const MIN_FRAME_SIZE: usize = 4 + 1 + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    Commit = 1,
    Chronology = 2,
}

impl FrameKind {
    /// Convert from u8, returns None for invalid values
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(FrameKind::Commit),
            2 => Some(FrameKind::Chronology),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Header of one commit in a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEntry {
    pub commit_time: i64,
    /// Number of CHRONOLOGY frames that follow.
    pub chronology_count: u32,
    pub comment: Option<String>,
}

/// A committed version with its stamp tuple resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampedVersion {
    pub stamp: Stamp,
    pub commit_state: CommitState,
    pub data: VersionData,
}

/// The committed versions of one chronology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChronologyEntry {
    pub uuid: Uuid,
    pub nid: Nid,
    pub object_type: ObjectType,
    pub assemblage: Option<Nid>,
    pub referenced_component: Option<Nid>,
    pub versions: Vec<StampedVersion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum ChangesetFrame {
    Commit(CommitEntry),
    Chronology(ChronologyEntry),
}

impl ChangesetFrame {
    pub fn kind(&self) -> FrameKind {
        match self {
            ChangesetFrame::Commit(_) => FrameKind::Commit,
            ChangesetFrame::Chronology(_) => FrameKind::Chronology,
        }
    }

    /// Serialize the complete frame, checksum included.
    pub fn serialize(&self) -> io::Result<Vec<u8>> {
        let mut body = vec![self.kind().as_u8()];
        match self {
            ChangesetFrame::Commit(entry) => write_commit(&mut body, entry)?,
            ChangesetFrame::Chronology(entry) => write_chronology(&mut body, entry)?,
        }

        let frame_length = (4 + body.len() + 4) as u32;
        let mut frame = Vec::with_capacity(frame_length as usize);
        frame.extend_from_slice(&frame_length.to_le_bytes());
        frame.extend_from_slice(&body);
        let checksum = compute_checksum(&frame);
        frame.extend_from_slice(&checksum.to_le_bytes());
        Ok(frame)
    }

    /// Deserialize one frame from the front of `data`, verifying its
    /// checksum. Returns the frame and the bytes consumed.
    pub fn deserialize(data: &[u8]) -> io::Result<(Self, usize)> {
        if data.len() < MIN_FRAME_SIZE {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "Frame too short"));
        }

        let frame_length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if frame_length < MIN_FRAME_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid frame length: {}", frame_length),
            ));
        }
        if data.len() < frame_length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "Frame truncated: expected {} bytes, got {}",
                    frame_length,
                    data.len()
                ),
            ));
        }

        let checksum_offset = frame_length - 4;
        let stored = u32::from_le_bytes([
            data[checksum_offset],
            data[checksum_offset + 1],
            data[checksum_offset + 2],
            data[checksum_offset + 3],
        ]);
        let computed = compute_checksum(&data[..checksum_offset]);
        if computed != stored {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Checksum mismatch: computed {:08x}, stored {:08x}",
                    computed, stored
                ),
            ));
        }

        let kind = FrameKind::from_u8(data[4]).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid frame kind: {}", data[4]),
            )
        })?;

        let mut body = Cursor::new(&data[5..checksum_offset]);
        let frame = match kind {
            FrameKind::Commit => ChangesetFrame::Commit(read_commit(&mut body)?),
            FrameKind::Chronology => ChangesetFrame::Chronology(read_chronology(&mut body)?),
        };
        if body.position() as usize != checksum_offset - 5 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Trailing bytes in frame body",
            ));
        }
        Ok((frame, frame_length))
    }
}

fn write_commit<W: Write>(w: &mut W, entry: &CommitEntry) -> io::Result<()> {
    w.write_all(&entry.commit_time.to_le_bytes())?;
    w.write_all(&entry.chronology_count.to_le_bytes())?;
    match &entry.comment {
        Some(text) => {
            w.write_all(&[1])?;
            write_bytes(w, text.as_bytes())
        }
        None => w.write_all(&[0]),
    }
}

fn read_commit(r: &mut Cursor<&[u8]>) -> io::Result<CommitEntry> {
    let commit_time = read_i64(r)?;
    let chronology_count = read_u32(r)?;
    let comment = match read_u8(r)? {
        0 => None,
        _ => Some(read_string(r)?),
    };
    Ok(CommitEntry {
        commit_time,
        chronology_count,
        comment,
    })
}

/// Format:
/// - uuid (16 bytes), nid (i32 LE), object type (u8)
/// - assemblage, referenced component: each (u8 present, i32 LE)
/// - version count (u32 LE), then per version: status (u8), time (i64),
///   author, module, path (i32 each), commit state (u8), payload
fn write_chronology<W: Write>(w: &mut W, entry: &ChronologyEntry) -> io::Result<()> {
    w.write_all(entry.uuid.as_bytes())?;
    w.write_all(&entry.nid.to_le_bytes())?;
    w.write_all(&[entry.object_type.as_u8()])?;
    for field in [entry.assemblage, entry.referenced_component] {
        w.write_all(&[u8::from(field.is_some())])?;
        w.write_all(&field.unwrap_or(0).to_le_bytes())?;
    }
    w.write_all(&(entry.versions.len() as u32).to_le_bytes())?;
    for version in &entry.versions {
        let stamp = &version.stamp;
        w.write_all(&[stamp.status.as_u8()])?;
        w.write_all(&stamp.time.to_le_bytes())?;
        w.write_all(&stamp.author.to_le_bytes())?;
        w.write_all(&stamp.module.to_le_bytes())?;
        w.write_all(&stamp.path.to_le_bytes())?;
        w.write_all(&[commit_state_byte(version.commit_state)])?;
        version.data.write_to(w)?;
    }
    Ok(())
}

fn read_chronology<R: Read>(r: &mut R) -> io::Result<ChronologyEntry> {
    let mut uuid = [0u8; 16];
    r.read_exact(&mut uuid)?;
    let nid = read_i32(r)?;
    let type_byte = read_u8(r)?;
    let object_type = ObjectType::from_u8(type_byte)
        .ok_or_else(|| invalid(format!("Invalid object type: {}", type_byte)))?;

    let mut optional = [None, None];
    for slot in &mut optional {
        let present = read_u8(r)? != 0;
        let value = read_i32(r)?;
        *slot = present.then_some(value);
    }

    let count = read_u32(r)?;
    let mut versions = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        let status_byte = read_u8(r)?;
        let status = Status::from_u8(status_byte)
            .ok_or_else(|| invalid(format!("Invalid status: {}", status_byte)))?;
        let time = read_i64(r)?;
        let author = read_i32(r)?;
        let module = read_i32(r)?;
        let path = read_i32(r)?;
        let commit_state = commit_state_from_byte(read_u8(r)?)?;
        let data = VersionData::read_from(r)?;
        versions.push(StampedVersion {
            stamp: Stamp::new(status, time, author, module, path),
            commit_state,
            data,
        });
    }

    Ok(ChronologyEntry {
        uuid: Uuid::from_bytes(uuid),
        nid,
        object_type,
        assemblage: optional[0],
        referenced_component: optional[1],
        versions,
    })
}

fn commit_state_byte(state: CommitState) -> u8 {
    match state {
        CommitState::Uncommitted => 0,
        CommitState::Committed => 1,
        CommitState::Canceled => 2,
    }
}

fn commit_state_from_byte(value: u8) -> io::Result<CommitState> {
    match value {
        0 => Ok(CommitState::Uncommitted),
        1 => Ok(CommitState::Committed),
        2 => Ok(CommitState::Canceled),
        other => Err(invalid(format!("Invalid commit state: {}", other))),
    }
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

fn write_bytes<W: Write>(w: &mut W, bytes: &[u8]) -> io::Result<()> {
    w.write_all(&(bytes.len() as u32).to_le_bytes())?;
    w.write_all(bytes)
}

fn read_u8<R: Read>(r: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_i32<R: Read>(r: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_i64<R: Read>(r: &mut R) -> io::Result<i64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

fn read_string(r: &mut Cursor<&[u8]>) -> io::Result<String> {
    let len = read_u32(r)? as usize;
    let remaining = r.get_ref().len().saturating_sub(r.position() as usize);
    if len > remaining {
        return Err(invalid(format!(
            "String length {} exceeds remaining frame body {}",
            len, remaining
        )));
    }
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| invalid(format!("Invalid UTF-8: {}", e)))
}
