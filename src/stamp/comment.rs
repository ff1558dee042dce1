//! Stamp comment table
//!
//! At most one free-text comment per stamp sequence. Setting `None` removes it.
//!
//! Binary format (`stamp-comment.map`, little endian):
//! - entry count (u32)
//! - entry count × (stamp i32, text length u32, UTF-8 text)

use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::StampSequence;

#[derive(Debug, Default)]
pub struct StampCommentMap {
    comments: RwLock<BTreeMap<StampSequence, String>>,
}

impl StampCommentMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<StampSequence, String>> {
        self.comments.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<StampSequence, String>> {
        self.comments.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the comment of `stamp`; `None` removes it.
    pub fn set(&self, stamp: StampSequence, comment: Option<String>) {
        let mut comments = self.write();
        match comment {
            Some(text) => {
                comments.insert(stamp, text);
            }
            None => {
                comments.remove(&stamp);
            }
        }
    }

    pub fn get(&self, stamp: StampSequence) -> Option<String> {
        self.read().get(&stamp).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let entries: Vec<(StampSequence, String)> = self
            .read()
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect();

        writer.write_all(&(entries.len() as u32).to_le_bytes())?;
        for (stamp, text) in entries {
            writer.write_all(&stamp.to_le_bytes())?;
            writer.write_all(&(text.len() as u32).to_le_bytes())?;
            writer.write_all(text.as_bytes())?;
        }
        Ok(())
    }

    /// Merge entries written by [`StampCommentMap::write_to`] into this map.
    pub fn read_from<R: Read>(&self, reader: &mut R) -> io::Result<usize> {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf)?;
        let count = u32::from_le_bytes(buf) as usize;

        for _ in 0..count {
            reader.read_exact(&mut buf)?;
            let stamp = i32::from_le_bytes(buf);
            reader.read_exact(&mut buf)?;
            let len = u32::from_le_bytes(buf) as usize;
            let mut text = Vec::new();
            reader.by_ref().take(len as u64).read_to_end(&mut text)?;
            if text.len() != len {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "Comment truncated",
                ));
            }
            let text = String::from_utf8(text).map_err(|e| {
                io::Error::new(io::ErrorKind::InvalidData, format!("Invalid UTF-8: {}", e))
            })?;
            self.set(stamp, Some(text));
        }
        Ok(count)
    }
}
