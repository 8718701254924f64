//! Utility functions for file handling and common operations

use crate::{LfvError, LfvResult};
use env_logger::Env;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// Check if a file is gzip compressed
pub fn is_gzipped<P: AsRef<Path>>(path: P) -> LfvResult<bool> {
    let mut file = File::open(path)?;
    let mut buffer = [0; 2];

    match file.read_exact(&mut buffer) {
        Ok(()) => Ok(buffer == [0x1f, 0x8b]),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(LfvError::Io(e)),
    }
}

/// Validate file paths and check if they exist
pub fn validate_file_exists<P: AsRef<Path>>(path: P) -> LfvResult<()> {
    if !path.as_ref().exists() {
        return Err(LfvError::FileNotFound(
            path.as_ref().to_string_lossy().to_string(),
        ));
    }
    Ok(())
}

/// Validate that a file is readable
pub fn validate_file_readable<P: AsRef<Path>>(path: P) -> LfvResult<()> {
    validate_file_exists(&path)?;

    File::open(&path)
        .map_err(|_| LfvError::FileNotFound(path.as_ref().to_string_lossy().to_string()))?;

    Ok(())
}

/// Check if a path has a specific extension
pub fn has_extension<P: AsRef<Path>>(path: P, extension: &str) -> bool {
    path.as_ref()
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Sample name of a file: its name up to the first `.`
pub fn sample_name<P: AsRef<Path>>(path: P) -> String {
    let name = path
        .as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    match name.split_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => name,
    }
}

/// Short identifier of a file: its name up to the first `_`
pub fn file_prefix<P: AsRef<Path>>(path: P) -> String {
    let name = sample_name(path);
    match name.split_once('_') {
        Some((prefix, _)) => prefix.to_string(),
        None => name,
    }
}

/// Create parent directories if they don't exist
pub fn ensure_parent_dirs<P: AsRef<Path>>(path: P) -> LfvResult<()> {
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Refuse to clobber an existing output unless forced
pub fn check_output<P: AsRef<Path>>(path: P, force: bool) -> LfvResult<()> {
    if path.as_ref().exists() && !force {
        return Err(LfvError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!(
                "Output file {:?} already exists. Use --force to overwrite.",
                path.as_ref()
            ),
        )));
    }
    Ok(())
}

/// Open an output file, gzip-compressed when the name ends in `.gz`
pub fn create_output<P: AsRef<Path>>(path: P) -> LfvResult<Box<dyn Write>> {
    let file = File::create(&path)?;
    let writer: Box<dyn Write> = if has_extension(&path, "gz") {
        Box::new(GzEncoder::new(file, Compression::default()))
    } else {
        Box::new(BufWriter::new(file))
    };
    Ok(writer)
}

/// Initialize env_logger from the verbosity flags shared by every binary
pub fn init_logging(verbose: bool, debug: bool) {
    let log_level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();
}

/// Log progress information
pub fn log_progress(current: usize, total: usize, message: &str) {
    if total > 0 {
        let percentage = (current as f64 / total as f64) * 100.0;
        log::info!("{}: {} / {} ({:.1}%)", message, current, total, percentage);
    }
}

/// Timer utility for measuring execution time
pub struct Timer {
    start: std::time::Instant,
    name: String,
}

impl Timer {
    pub fn new(name: &str) -> Self {
        log::info!("Starting timer: {}", name);
        Timer {
            start: std::time::Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }

    pub fn log_elapsed(&self) {
        let duration = self.elapsed();
        log::info!("Timer '{}' elapsed: {:.2?}", self.name, duration);
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.log_elapsed();
    }
}
