//! Reader for the `TAGDEN.BIN` asset archive.
//!
//! The archive starts with a directory of variable-size frames, all fields
//! big-endian:
//!
//! ```text
//! [+0x00] unknown0    u16
//! [+0x02] kind        u16   16 = file, anything else ends the directory
//! [+0x04] offset      u32   absolute offset of the file data
//! [+0x08] size        u32
//! [+0x0c] unknown1    u16
//! [+0x0e] frame_size  u16   header included
//! [+0x10] path        NUL-terminated, padded to frame_size
//! ```
//!
//! Paths are absolute names from the machine the archive was built on
//! (`l:\scorpc\game\...`).

use log::debug;
use num_enum::TryFromPrimitive;
use packed_struct::prelude::*;
use packed_struct::PackingError;
use std::convert::TryFrom;
use std::fmt;

use crate::filetype;

pub const FRAME_HEADER_SIZE: usize = 16;

const BUILD_MACHINE_PREFIX: [&str; 3] = ["l:", "scorpc", "game"];

#[derive(Debug)]
pub enum TagdenError {
    IoError(std::io::Error),
    MalformedArchive(String),
    EmptyArchive,
}

impl From<std::io::Error> for TagdenError {
    fn from(error: std::io::Error) -> Self {
       TagdenError::IoError(error)
    }
}

impl From<PackingError> for TagdenError {
    fn from(error: PackingError) -> Self {
       TagdenError::MalformedArchive(format!("unreadable directory frame: {:?}", error))
    }
}

impl fmt::Display for TagdenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagdenError::IoError(e) => write!(f, "I/O error: {}", e),
            TagdenError::MalformedArchive(reason) => write!(f, "malformed archive: {}", reason),
            TagdenError::EmptyArchive => write!(f, "archive directory lists no files"),
        }
    }
}

impl std::error::Error for TagdenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TagdenError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

fn malformed<T>(reason: String) -> Result<T, TagdenError> {
    Err(TagdenError::MalformedArchive(reason))
}

#[derive(TryFromPrimitive)]
#[derive(Debug,PartialEq,Eq,Clone,Copy)]
#[repr(u16)]
pub enum FrameKind {
    File = 16,
}

#[derive(PackedStruct)]
#[packed_struct(endian="msb")]
pub struct DirectoryFrame {
    pub unknown0: u16,
    pub kind: u16,
    pub offset: u32,
    pub size: u32,
    pub unknown1: u16,
    pub frame_size: u16,
}

/// One file packed in the archive. `data` borrows from the archive buffer.
#[derive(Debug, Clone)]
pub struct Record<'a> {
    pub index: usize,
    pub kind: FrameKind,
    pub offset: u32,
    pub length: u32,
    pub unknown0: u16,
    pub unknown1: u16,
    pub internal_path: Option<String>,
    pub relative_path: Option<String>,
    /// Relative path (with `/` separators) or the zero-padded index.
    pub identifier: String,
    pub type_hint: String,
    pub data: &'a [u8],
}

impl<'a> Record<'a> {
    pub fn is_named(&self) -> bool {
        self.relative_path.is_some()
    }

    pub fn output_name(&self) -> String {
        if self.is_named() {
            self.identifier.clone()
        } else {
            format!("{}.{}", self.identifier, self.type_hint)
        }
    }
}

pub fn index_identifier(index: usize) -> String {
    format!("{:04}", index)
}

/// Turn a build-machine path into a relative one.
///
/// Returns `Ok(None)` for names that have no components left once the drive
/// and build prefix are removed.
pub fn relative_path(internal_path: &str) -> Result<Option<String>, TagdenError> {
    let mut parts: Vec<&str> = internal_path
        .split(|c: char| c == '\\' || c == '/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();

    let has_prefix = parts.len() >= BUILD_MACHINE_PREFIX.len() && parts
        .iter()
        .zip(BUILD_MACHINE_PREFIX.iter())
        .all(|(part, prefix)| part.eq_ignore_ascii_case(prefix));
    if has_prefix {
        parts.drain(..BUILD_MACHINE_PREFIX.len());
    } else if parts.first().map_or(false, |part| part.ends_with(':')) {
        parts.remove(0);
    }

    if parts.iter().any(|part| *part == "..") {
        return malformed(format!("path '{}' escapes the output directory", internal_path));
    }
    if parts.is_empty() {
        return Ok(None);
    }
    Ok(Some(parts.join("/")))
}

fn read_name(field: &[u8]) -> Option<String> {
    let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
    if end == 0 {
        return None;
    }
    Some(String::from_utf8_lossy(&field[..end]).into_owned())
}

fn check_overlap(records: &[Record]) -> Result<(), TagdenError> {
    let mut ranges: Vec<(u64, u64, usize)> = records
        .iter()
        .filter(|r| r.length != 0)
        .map(|r| (r.offset as u64, r.offset as u64 + r.length as u64, r.index))
        .collect();
    ranges.sort_unstable();
    for pair in ranges.windows(2) {
        let (_, prev_end, prev_index) = pair[0];
        let (next_start, _, next_index) = pair[1];
        if prev_end > next_start {
            return malformed(format!("records {} and {} overlap", prev_index, next_index));
        }
    }
    Ok(())
}

/// Split `input` into its records, in directory order.
pub fn parse(input: &[u8]) -> Result<Vec<Record<'_>>, TagdenError> {
    let mut records: Vec<Record> = Vec::new();

    let mut position: usize = 0;
    loop {
        let header = match input.get(position..position + FRAME_HEADER_SIZE) {
            Some(header) => header,
            None => return malformed(format!("directory frame at {:#x} is truncated", position)),
        };
        let frame = DirectoryFrame::unpack_from_slice(header)?;
        let kind = match FrameKind::try_from(frame.kind) {
            Ok(kind) => kind,
            Err(_) => {
                debug!("directory ends at {:#x} (kind {})", position, frame.kind);
                break;
            }
        };

        let frame_size = frame.frame_size as usize;
        if frame_size < FRAME_HEADER_SIZE {
            return malformed(format!("directory frame at {:#x} has size {}", position, frame_size));
        }
        let name_field = match input.get(position + FRAME_HEADER_SIZE..position + frame_size) {
            Some(field) => field,
            None => return malformed(format!("directory frame at {:#x} runs past the end", position)),
        };

        let start = frame.offset as usize;
        let end = start as u64 + frame.size as u64;
        if end > input.len() as u64 {
            return malformed(format!("record {} at {:#x} length {} exceeds archive size {}",
                records.len(), frame.offset, frame.size, input.len()));
        }
        let data = &input[start..end as usize];

        let index = records.len();
        let internal_path = read_name(name_field);
        let relative = match &internal_path {
            Some(path) => relative_path(path)?,
            None => None,
        };
        let type_hint = filetype::infer(relative.as_deref(), data);
        let identifier = match &relative {
            Some(path) => path.clone(),
            None => index_identifier(index),
        };
        debug!("Found file '{}' offset {:#x} size {}", identifier, frame.offset, frame.size);

        records.push(Record {
            index,
            kind,
            offset: frame.offset,
            length: frame.size,
            unknown0: frame.unknown0,
            unknown1: frame.unknown1,
            internal_path,
            relative_path: relative,
            identifier,
            type_hint,
            data,
        });
        position += frame_size;
    }

    if records.is_empty() {
        return Err(TagdenError::EmptyArchive);
    }
    check_overlap(&records)?;
    Ok(records)
}

pub struct Archive {
    data: Vec<u8>,
}

impl Archive {
    pub fn open(path: &str) -> Result<Archive, TagdenError> {
        let data = std::fs::read(path)?;
        Ok(Archive{ data })
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Archive{ data }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn records(&self) -> Result<Vec<Record<'_>>, TagdenError> {
        parse(&self.data)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub struct Entry<'a> {
        pub name: &'a str,
        pub offset: u32,
        pub size: u32,
    }

    fn push_frame(out: &mut Vec<u8>, kind: u16, offset: u32, size: u32, name: &str) {
        let name_len = name.len() + 1;
        let frame_size = FRAME_HEADER_SIZE + name_len + (name_len % 2);
        out.extend_from_slice(&0x1234u16.to_be_bytes());
        out.extend_from_slice(&kind.to_be_bytes());
        out.extend_from_slice(&offset.to_be_bytes());
        out.extend_from_slice(&size.to_be_bytes());
        out.extend_from_slice(&0xabcdu16.to_be_bytes());
        out.extend_from_slice(&(frame_size as u16).to_be_bytes());
        out.extend_from_slice(name.as_bytes());
        out.resize(out.len() + frame_size - FRAME_HEADER_SIZE - name.len(), 0);
    }

    /// Directory with explicit offsets, terminated by a kind 0 frame.
    pub fn build_directory(entries: &[Entry]) -> Vec<u8> {
        let mut out = Vec::new();
        for entry in entries {
            push_frame(&mut out, 16, entry.offset, entry.size, entry.name);
        }
        push_frame(&mut out, 0, 0, 0, "");
        out
    }

    fn directory_size(names: &[&str]) -> usize {
        let frames: usize = names
            .iter()
            .map(|name| {
                let name_len = name.len() + 1;
                FRAME_HEADER_SIZE + name_len + (name_len % 2)
            })
            .sum();
        frames + FRAME_HEADER_SIZE + 2
    }

    /// Complete archive holding `blobs` back to back after the directory.
    pub fn build_archive(blobs: &[(&str, &[u8])]) -> Vec<u8> {
        let names: Vec<&str> = blobs.iter().map(|(name, _)| *name).collect();
        let mut offset = directory_size(&names) as u32;
        let mut entries = Vec::new();
        for (name, blob) in blobs {
            entries.push(Entry{ name: *name, offset, size: blob.len() as u32 });
            offset += blob.len() as u32;
        }
        let mut out = build_directory(&entries);
        for (_, blob) in blobs {
            out.extend_from_slice(blob);
        }
        out
    }

    #[test]
    fn round_trip_of_synthetic_blobs() {
        let blobs: [(&str, &[u8]); 4] = [
            ("l:\\scorpc\\game\\art\\title.r0v", &[0, 1, 0, 1, 0x7f, 0xff]),
            ("l:\\scorpc\\game\\sound\\boom.wav", b"RIFF0000WAVE"),
            ("l:\\scorpc\\game\\maps\\level1.hgt", &[9; 33]),
            ("l:\\scorpc\\game\\empty.dat", &[]),
        ];
        let archive = build_archive(&blobs);
        let records = parse(&archive).unwrap();
        assert_eq!(records.len(), blobs.len());
        for (n, (record, (_, blob))) in records.iter().zip(blobs.iter()).enumerate() {
            assert_eq!(record.index, n);
            assert_eq!(record.data, *blob);
            assert_eq!(record.length as usize, blob.len());
            assert!(record.offset as usize + record.length as usize <= archive.len());
        }
        assert_eq!(records[0].identifier, "art/title.r0v");
        assert_eq!(records[0].type_hint, "r0v");
        assert_eq!(records[1].identifier, "sound/boom.wav");
        assert_eq!(records[2].type_hint, "hgt");
        assert_eq!(records[0].kind, FrameKind::File);
        assert_eq!(records[0].unknown0, 0x1234);
        assert_eq!(records[0].unknown1, 0xabcd);
        assert_eq!(records[0].internal_path.as_deref(), Some("l:\\scorpc\\game\\art\\title.r0v"));
    }

    #[test]
    fn records_at_fixed_offsets() {
        let entries = [
            Entry{ name: "", offset: 8, size: 4 },
            Entry{ name: "", offset: 12, size: 6 },
        ];
        let archive = build_directory(&entries);
        let records = parse(&archive).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].data.len(), 4);
        assert_eq!(records[1].data.len(), 6);
        assert_eq!(records[0].data, &archive[8..12]);
        assert_eq!(records[1].data, &archive[12..18]);
    }

    #[test]
    fn unnamed_records_use_padded_index() {
        let entries = [
            Entry{ name: "", offset: 0, size: 2 },
            Entry{ name: "", offset: 2, size: 2 },
        ];
        let archive = build_directory(&entries);
        let records = parse(&archive).unwrap();
        assert_eq!(records[0].identifier, "0000");
        assert_eq!(records[1].identifier, "0001");
        assert!(!records[1].is_named());
        assert_eq!(records[1].output_name(), format!("0001.{}", records[1].type_hint));
        assert!(index_identifier(9) < index_identifier(10));
    }

    #[test]
    fn record_past_end_is_malformed() {
        let mut archive = build_directory(&[Entry{ name: "a.bin", offset: 100, size: 50 }]);
        archive.resize(120, 0);
        match parse(&archive) {
            Err(TagdenError::MalformedArchive(_)) => {},
            other => panic!("expected MalformedArchive, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn overlapping_records_are_malformed() {
        let mut archive = build_directory(&[
            Entry{ name: "a.bin", offset: 64, size: 16 },
            Entry{ name: "b.bin", offset: 72, size: 16 },
        ]);
        archive.resize(128, 0);
        assert!(matches!(parse(&archive), Err(TagdenError::MalformedArchive(_))));
    }

    #[test]
    fn empty_directory() {
        let archive = build_directory(&[]);
        assert!(matches!(parse(&archive), Err(TagdenError::EmptyArchive)));
    }

    #[test]
    fn truncated_directory_is_malformed() {
        let archive = build_archive(&[("x.bin", &[1, 2, 3])]);
        assert!(matches!(parse(&archive[..10]), Err(TagdenError::MalformedArchive(_))));
        assert!(matches!(parse(&[]), Err(TagdenError::MalformedArchive(_))));

        // Terminator frame cut short.
        let directory = build_directory(&[Entry{ name: "x.bin", offset: 0, size: 1 }]);
        let cut = directory.len() - FRAME_HEADER_SIZE - 2 + 4;
        assert!(matches!(parse(&directory[..cut]), Err(TagdenError::MalformedArchive(_))));
    }

    #[test]
    fn undersized_frame_is_malformed() {
        let mut archive = build_directory(&[Entry{ name: "x.bin", offset: 0, size: 1 }]);
        archive[14] = 0;
        archive[15] = 8;
        assert!(matches!(parse(&archive), Err(TagdenError::MalformedArchive(_))));
    }

    #[test]
    fn frame_past_end_is_malformed() {
        let mut archive = build_directory(&[Entry{ name: "x.bin", offset: 0, size: 1 }]);
        let frame_size = (archive.len() + 8) as u16;
        archive[14..16].copy_from_slice(&frame_size.to_be_bytes());
        assert!(matches!(parse(&archive), Err(TagdenError::MalformedArchive(_))));
    }

    #[test]
    fn empty_records_may_share_an_offset() {
        let archive = build_directory(&[
            Entry{ name: "a.bin", offset: 4, size: 0 },
            Entry{ name: "b.bin", offset: 4, size: 0 },
            Entry{ name: "c.bin", offset: 2, size: 4 },
        ]);
        let records = parse(&archive).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records[0].data.is_empty());
        assert!(records[1].data.is_empty());
        assert_eq!(records[2].data, &archive[2..6]);
    }

    #[test]
    fn build_prefix_is_stripped() {
        assert_eq!(relative_path("l:\\scorpc\\game\\art\\a.r0v").unwrap(), Some("art/a.r0v".to_string()));
        assert_eq!(relative_path("L:\\SCORPC\\GAME\\b.pal").unwrap(), Some("b.pal".to_string()));
        assert_eq!(relative_path("c:\\other\\c.bin").unwrap(), Some("other/c.bin".to_string()));
        assert_eq!(relative_path("plain\\.\\d.bin").unwrap(), Some("plain/d.bin".to_string()));
        assert_eq!(relative_path("l:\\scorpc\\game\\").unwrap(), None);
        assert!(matches!(relative_path("l:\\scorpc\\game\\..\\..\\evil"), Err(TagdenError::MalformedArchive(_))));
    }

    #[test]
    fn archive_wrapper_parses_owned_buffer() {
        let archive = Archive::from_bytes(build_archive(&[("one.bin", &[7, 7, 7])]));
        assert!(!archive.is_empty());
        assert_eq!(archive.len(), archive.data().len());
        let records = archive.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data, &[7, 7, 7]);
        assert_eq!(records[0].identifier, "one.bin");
    }
}
