//! Changeset segment reader
//!
//! Frames are read strictly in order. Any bad checksum, truncated frame or
//! malformed body stops the read with `Corruption` at the frame's offset;
//! nothing after it is returned.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use super::errors::{ChangesetError, ChangesetResult};
use super::record::{ChangesetFrame, MIN_FRAME_SIZE};

pub struct SegmentReader {
    path: PathBuf,
    reader: BufReader<File>,
    current_offset: u64,
    file_size: u64,
}

impl SegmentReader {
    pub fn open(path: &Path) -> ChangesetResult<Self> {
        let read_failed = |source| ChangesetError::ReadFailed {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(read_failed)?;
        let file_size = file.metadata().map_err(read_failed)?.len();

        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            current_offset: 0,
            file_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Read the next frame.
    ///
    /// - `Ok(Some(frame))` if a frame was read
    /// - `Ok(None)` at a clean end of file
    /// - `Err(Corruption)` on any framing or checksum failure
    pub fn read_next(&mut self) -> ChangesetResult<Option<ChangesetFrame>> {
        if self.current_offset >= self.file_size {
            return Ok(None);
        }

        let remaining = self.file_size - self.current_offset;
        if remaining < MIN_FRAME_SIZE as u64 {
            return Err(self.corruption(format!(
                "Truncated segment: {} bytes remaining, minimum frame size is {}",
                remaining, MIN_FRAME_SIZE
            )));
        }

        let mut len_buf = [0u8; 4];
        self.reader
            .read_exact(&mut len_buf)
            .map_err(|e| self.corruption(format!("Failed to read frame length: {}", e)))?;
        let frame_length = u32::from_le_bytes(len_buf) as u64;

        if frame_length < MIN_FRAME_SIZE as u64 {
            return Err(self.corruption(format!("Invalid frame length: {}", frame_length)));
        }
        if frame_length > remaining {
            return Err(self.corruption(format!(
                "Frame length {} exceeds remaining segment size {}",
                frame_length, remaining
            )));
        }

        let mut frame_buf = vec![0u8; frame_length as usize];
        frame_buf[..4].copy_from_slice(&len_buf);
        self.reader
            .read_exact(&mut frame_buf[4..])
            .map_err(|e| self.corruption(format!("Failed to read frame body: {}", e)))?;

        let (frame, consumed) =
            ChangesetFrame::deserialize(&frame_buf).map_err(|e| self.corruption(e.to_string()))?;

        self.current_offset += consumed as u64;
        Ok(Some(frame))
    }

    /// Read every remaining frame.
    pub fn read_all(&mut self) -> ChangesetResult<Vec<ChangesetFrame>> {
        let mut frames = Vec::new();
        while let Some(frame) = self.read_next()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn corruption(&self, reason: String) -> ChangesetError {
        ChangesetError::corruption(&self.path, self.current_offset, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::record::CommitEntry;
    use std::fs;
    use tempfile::TempDir;

    fn commit_frame(time: i64) -> ChangesetFrame {
        ChangesetFrame::Commit(CommitEntry {
            commit_time: time,
            chronology_count: 0,
            comment: Some(format!("commit {}", time)),
        })
    }

    fn write_segment(dir: &TempDir, frames: &[ChangesetFrame]) -> PathBuf {
        let path = dir.path().join("segment.ibdf");
        let mut bytes = Vec::new();
        for frame in frames {
            bytes.extend(frame.serialize().unwrap());
        }
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_reads_frames_in_order() {
        let dir = TempDir::new().unwrap();
        let path = write_segment(&dir, &[commit_frame(1), commit_frame(2)]);

        let mut reader = SegmentReader::open(&path).unwrap();
        assert_eq!(reader.read_all().unwrap(), vec![commit_frame(1), commit_frame(2)]);
        assert!(reader.read_next().unwrap().is_none());
    }

    #[test]
    fn test_empty_segment_has_no_frames() {
        let dir = TempDir::new().unwrap();
        let path = write_segment(&dir, &[]);
        assert!(SegmentReader::open(&path).unwrap().read_next().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_second_frame_reports_its_offset() {
        let dir = TempDir::new().unwrap();
        let first_len = commit_frame(1).serialize().unwrap().len();
        let path = write_segment(&dir, &[commit_frame(1), commit_frame(2)]);

        let mut bytes = fs::read(&path).unwrap();
        bytes[first_len + 6] ^= 0xFF;
        fs::write(&path, bytes).unwrap();

        let mut reader = SegmentReader::open(&path).unwrap();
        assert_eq!(reader.read_next().unwrap(), Some(commit_frame(1)));
        match reader.read_next() {
            Err(ChangesetError::Corruption { offset, .. }) => assert_eq!(offset, first_len as u64),
            other => panic!("expected corruption, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_tail_is_corruption() {
        let dir = TempDir::new().unwrap();
        let path = write_segment(&dir, &[commit_frame(1)]);
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 2]).unwrap();

        let err = SegmentReader::open(&path).unwrap().read_next().unwrap_err();
        assert!(err.is_fatal());
    }
}
