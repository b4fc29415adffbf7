use log::{info, warn};
use std::collections::HashSet;
use std::fmt;

use crate::filetype;
use crate::r0v::{self, R0vError, RasterImage};
use crate::tagden::{self, Record, TagdenError};

/// What happened when the record was offered to a decoder.
#[derive(Debug)]
pub enum Decoded {
    Image(RasterImage),
    Failed(R0vError),
    /// No decoder exists for this type; the record is passed through raw.
    Unsupported,
}

pub struct ExtractedRecord<'a> {
    pub record: Record<'a>,
    /// Unique relative path for this record, compared case-insensitively.
    pub output_name: String,
    pub decoded: Decoded,
}

#[derive(Debug, Default)]
pub struct Summary {
    pub records_extracted: usize,
    pub images_decoded: usize,
    pub images_failed: Vec<(String, String)>,
    pub unsupported: usize,
}

impl Summary {
    pub fn add(&mut self, identifier: &str, decoded: &Decoded) {
        self.records_extracted += 1;
        match decoded {
            Decoded::Image(_) => self.images_decoded += 1,
            Decoded::Failed(err) => self.images_failed.push((identifier.to_string(), err.to_string())),
            Decoded::Unsupported => self.unsupported += 1,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} records extracted, {} images decoded, {} images failed",
            self.records_extracted, self.images_decoded, self.images_failed.len())?;
        for (identifier, reason) in self.images_failed.iter() {
            write!(f, "\n  {}: {}", identifier, reason)?;
        }
        Ok(())
    }
}

pub struct Extraction<'a> {
    pub records: Vec<ExtractedRecord<'a>>,
    pub summary: Summary,
}

fn with_index(name: &str, index: usize) -> String {
    let (dir, file_name) = match name.rfind('/') {
        Some(n) => name.split_at(n + 1),
        None => ("", name),
    };
    match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() =>
            format!("{}{}.{}.{}", dir, stem, tagden::index_identifier(index), extension),
        _ => format!("{}.{}", name, tagden::index_identifier(index)),
    }
}

fn unique_output_name(record: &Record, taken: &mut HashSet<String>) -> String {
    let name = record.output_name();
    if taken.insert(name.to_lowercase()) {
        return name;
    }
    let renamed = with_index(&name, record.index);
    warn!("'{}' is already used by another record, writing record {} as '{}'", name, record.index, renamed);
    if !taken.insert(renamed.to_lowercase()) {
        warn!("'{}' is used twice, one copy will be overwritten", renamed);
    }
    renamed
}

pub fn decode_record(record: &Record) -> Decoded {
    if !filetype::is_decodable(&record.type_hint) {
        return Decoded::Unsupported;
    }
    match r0v::decode(record.data) {
        Ok(image) => Decoded::Image(image),
        Err(err) => {
            warn!("could not decode '{}': {}", record.identifier, err);
            Decoded::Failed(err)
        }
    }
}

/// Split the archive and decode every record that has a decoder.
///
/// Only directory errors abort; a record that fails to decode is still
/// returned, with the failure recorded in the summary.
pub fn extract(archive: &[u8]) -> Result<Extraction<'_>, TagdenError> {
    let records = tagden::parse(archive)?;
    info!("Found {} files, extracting...", records.len());

    let mut summary = Summary::default();
    let mut taken = HashSet::new();
    let mut extracted = Vec::with_capacity(records.len());
    for record in records {
        let output_name = unique_output_name(&record, &mut taken);
        let decoded = decode_record(&record);
        summary.add(&record.identifier, &decoded);
        extracted.push(ExtractedRecord{ record, output_name, decoded });
    }
    Ok(Extraction{ records: extracted, summary })
}
