extern crate scorchtools;

use log::{debug, error, info};
use std::env;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use scorchtools::extract::{self, Decoded};
use scorchtools::filetype;
use scorchtools::tagden::{Archive, TagdenError};

const TAGDEN: &str = "TAGDEN.BIN";
const DEFAULT_OUT_PATH: &str = "output";

#[derive(Debug)]
pub enum ExtractError {
    IoError(std::io::Error),
    TagdenError(TagdenError),
}

impl From<std::io::Error> for ExtractError {
    fn from(error: std::io::Error) -> Self {
       ExtractError::IoError(error)
    }
}

impl From<TagdenError> for ExtractError {
    fn from(error: TagdenError) -> Self {
       ExtractError::TagdenError(error)
    }
}

fn output_path(out_path: &Path, name: &str) -> Result<PathBuf, std::io::Error> {
    let path = out_path.join(name);
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            debug!("Creating directory '{}' for extraction", dir.display());
            std::fs::create_dir_all(dir)?;
        }
    }
    Ok(path)
}

fn extract_all(tagden_path: &str, out_path: &Path) -> Result<(), ExtractError> {
    let archive = Archive::open(tagden_path)?;
    info!("Extracting assets from file '{}' ({} bytes)", tagden_path, archive.len());
    if !out_path.exists() {
        info!("Creating output directory '{}'", out_path.display());
        std::fs::create_dir_all(out_path)?;
    }

    let extraction = extract::extract(archive.data())?;
    for entry in extraction.records.iter() {
        let record = &entry.record;
        let path = output_path(out_path, &entry.output_name)?;
        let mut r_file = File::create(&path)?;
        r_file.write_all(record.data)?;
        debug!("Extracted file '{}' ({}, {} bytes)", path.display(),
            filetype::describe(&record.type_hint), record.length);

        if let Decoded::Image(image) = &entry.decoded {
            let bmp_path = output_path(out_path, &format!("{}.bmp", entry.output_name))?;
            image.to_bmp().save(&bmp_path)?;
            debug!("Decoded image '{}' ({}x{})", bmp_path.display(), image.width, image.height);
        }
    }
    info!("All files extracted: {}", extraction.summary);
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        error!("usage: {} path/{} [out-path]", args[0], TAGDEN);
        std::process::exit(1);
    }
    let tagden_path = &args[1];
    let out_path = Path::new(args.get(2).map(String::as_str).unwrap_or(DEFAULT_OUT_PATH));

    match extract_all(tagden_path, out_path) {
        Ok(()) => { },
        Err(ExtractError::TagdenError(TagdenError::IoError(err))) => {
            error!("Failed to read '{}': {}", tagden_path, err);
            std::process::exit(1);
        },
        Err(ExtractError::TagdenError(err)) => {
            error!("{}: {}", tagden_path, err);
            std::process::exit(1);
        },
        Err(ExtractError::IoError(err)) => {
            error!("Failed to write output to '{}': {}", out_path.display(), err);
            std::process::exit(1);
        },
    }
}
