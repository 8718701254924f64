//! FASTA reading and writing

use crate::{
    utils::{create_output, is_gzipped},
    LfvError, LfvResult,
};
use flate2::read::MultiGzDecoder;
use seq_io::fasta::{self, Reader, Record};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Line width used when writing sequences
pub const LINE_WRAP: usize = 80;

/// Read the first sequence of a (possibly gzipped) FASTA file, joining its wrapped lines
pub fn read_reference<P: AsRef<Path>>(path: P) -> LfvResult<String> {
    let file = File::open(&path)
        .map_err(|_| LfvError::FileNotFound(path.as_ref().to_string_lossy().to_string()))?;

    let input: Box<dyn Read> = if is_gzipped(&path)? {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let mut reader = Reader::new(input);

    let record = match reader.next() {
        Some(record) => record.map_err(|e| {
            LfvError::MalformedRecord(format!("invalid FASTA {}: {}", path.as_ref().display(), e))
        })?,
        None => {
            return Err(LfvError::MalformedRecord(format!(
                "no sequence found in {}",
                path.as_ref().display()
            )))
        }
    };

    let mut sequence = Vec::new();
    for seq_line in record.seq_lines() {
        sequence.extend(seq_line.iter().filter(|b| !b.is_ascii_whitespace()));
    }
    if sequence.is_empty() {
        return Err(LfvError::MalformedRecord(format!(
            "no sequence found in {}",
            path.as_ref().display()
        )));
    }

    String::from_utf8(sequence).map_err(|_| {
        LfvError::MalformedRecord(format!("non-UTF-8 sequence in {}", path.as_ref().display()))
    })
}

/// Write one sequence with a `>name` header, wrapped at `line_length`
pub fn write_record<W: Write>(
    writer: &mut W,
    name: &str,
    sequence: &str,
    line_length: usize,
) -> LfvResult<()> {
    fasta::write_head(&mut *writer, name.as_bytes())?;
    fasta::write_wrap_seq(&mut *writer, sequence.as_bytes(), line_length.max(1))?;
    Ok(())
}

/// Write a single-record FASTA file
pub fn write_fasta(name: &str, sequence: &str, output_path: &Path, line_length: usize) -> LfvResult<()> {
    let mut writer = create_output(output_path)?;
    write_record(&mut writer, name, sequence, line_length)?;
    writer.flush()?;
    Ok(())
}
