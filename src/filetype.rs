use phf::phf_map;

/// Extension used when neither the name nor the contents identify a record.
pub const UNKNOWN_EXTENSION: &str = "bin";

pub const R0V_EXTENSION: &str = "r0v";

// Checked in order; the first matching prefix wins.
static SIGNATURES: &[(&[u8], &str)] = &[
    (b"RIFF", "wav"),
    (b"MThd", "mid"),
    (b"FORM", "iff"),
    (b"GIF87a", "gif"),
    (b"GIF89a", "gif"),
    (b"\x89PNG\r\n\x1a\n", "png"),
    (b"BM", "bmp"),
];

static FILE_TYPE_MAP: phf::Map<&'static str, &'static str> = phf_map! {
    "r0v" => "15-bit raster image",
    "wav" => "RIFF audio",
    "mid" => "MIDI sequence",
    "iff" => "IFF container",
    "gif" => "GIF image",
    "png" => "PNG image",
    "bmp" => "Windows bitmap",
    "bin" => "unknown data",
};

/// Classify `data` by its leading bytes, falling back to [`UNKNOWN_EXTENSION`].
pub fn sniff(data: &[u8]) -> &'static str {
    SIGNATURES
        .iter()
        .find(|(signature, _)| data.starts_with(signature))
        .map(|(_, extension)| *extension)
        .unwrap_or(UNKNOWN_EXTENSION)
}

pub fn extension_of(name: &str) -> Option<String> {
    let file_name = name.rsplit(|c: char| c == '/' || c == '\\').next()?;
    let (stem, extension) = file_name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}

/// Pick the type hint for a record: name extension first, then content.
pub fn infer(name: Option<&str>, data: &[u8]) -> String {
    match name.and_then(extension_of) {
        Some(extension) => extension,
        None => sniff(data).to_string(),
    }
}

pub fn describe(extension: &str) -> &'static str {
    FILE_TYPE_MAP.get(extension).copied().unwrap_or("not decoded")
}

pub fn is_decodable(extension: &str) -> bool {
    extension == R0V_EXTENSION
}
