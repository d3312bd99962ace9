//! Flat-text song database: groups of four lines per song
//! (id, name, artist, space-separated pitch values).

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use super::models::SongRecord;
use super::{DbError, Result};
use crate::pitch::{format_pitch, parse_pitch};

/// Parse every complete 4-line group. A trailing partial group is ignored;
/// bad numbers inside a pitch line are skipped.
pub fn parse_records(text: &str) -> Vec<SongRecord> {
    let lines: Vec<&str> = text.split('\n').map(|l| l.trim_end_matches('\r')).collect();
    lines
        .chunks_exact(4)
        .map(|group| SongRecord {
            song_id: group[0].to_string(),
            name: group[1].to_string(),
            artist: group[2].to_string(),
            pitch: parse_pitch(group[3]),
        })
        .collect()
}

/// Read and parse a database file.
pub fn read_file(path: &Path) -> Result<Vec<SongRecord>> {
    let text = std::fs::read_to_string(path).map_err(|source| DbError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_records(&text))
}

/// Write one record. Line breaks inside text fields are flattened to spaces
/// so the 4-line framing survives.
pub fn write_record<W: Write>(w: &mut W, record: &SongRecord) -> io::Result<()> {
    writeln!(w, "{}", single_line(&record.song_id))?;
    writeln!(w, "{}", single_line(&record.name))?;
    writeln!(w, "{}", single_line(&record.artist))?;
    writeln!(w, "{}", format_pitch(&record.pitch))
}

pub fn write_records<W: Write>(w: &mut W, records: &[SongRecord]) -> io::Result<()> {
    for record in records {
        write_record(w, record)?;
    }
    Ok(())
}

/// Append one record to a database file, creating it if needed.
pub fn append_to_file(path: &Path, record: &SongRecord) -> Result<()> {
    let io_err = |source| DbError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;
    write_record(&mut file, record).map_err(io_err)
}

/// Write a whole database file, replacing any existing one.
pub fn write_file(path: &Path, records: &[SongRecord]) -> Result<()> {
    let io_err = |source| DbError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    let file = std::fs::File::create(path).map_err(io_err)?;
    let mut writer = io::BufWriter::new(file);
    write_records(&mut writer, records).map_err(io_err)?;
    writer.flush().map_err(io_err)
}

fn single_line(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_groups_of_four() {
        let text = "1\nLittle Bee\nFolk\n60 62 64\n2\nOther\nSomeone\n55 x 57\n";
        let records = parse_records(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].song_id, "1");
        assert_eq!(records[0].name, "Little Bee");
        assert_eq!(records[0].artist, "Folk");
        assert_eq!(records[0].pitch, vec![60.0, 62.0, 64.0]);
        // Non-numeric tokens skipped
        assert_eq!(records[1].pitch, vec![55.0, 57.0]);
    }

    #[test]
    fn test_partial_group_ignored() {
        let records = parse_records("1\nA\nB\n60\n2\nC\n");
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_crlf_stripped() {
        let records = parse_records("1\r\nA\r\nB\r\n60 61\r\n");
        assert_eq!(records[0].song_id, "1");
        assert_eq!(records[0].artist, "B");
        assert_eq!(records[0].pitch, vec![60.0, 61.0]);
    }

    #[test]
    fn test_write_then_parse() {
        let records = vec![SongRecord {
            song_id: "abc".into(),
            name: "Two\nLines".into(),
            artist: "Me".into(),
            pitch: vec![60.0, 61.5],
        }];
        let mut buf = Vec::new();
        write_records(&mut buf, &records).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "abc\nTwo Lines\nMe\n60 61.5\n");
        let parsed = parse_records(&text);
        assert_eq!(parsed[0].name, "Two Lines");
        assert_eq!(parsed[0].pitch, vec![60.0, 61.5]);
    }

    #[test]
    fn test_append_and_read_file() {
        let path = std::env::temp_dir().join(format!("humsearch_flatfile_{}.txt", std::process::id()));
        std::fs::remove_file(&path).ok();
        let rec = SongRecord {
            song_id: "7".into(),
            name: "Song".into(),
            artist: "".into(),
            pitch: vec![1.0, 2.0],
        };
        append_to_file(&path, &rec).unwrap();
        append_to_file(&path, &rec).unwrap();
        let records = read_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], rec);
    }

    #[test]
    fn test_write_file_replaces() {
        let path = std::env::temp_dir().join(format!("humsearch_write_{}.txt", std::process::id()));
        let rec = |id: &str| SongRecord {
            song_id: id.into(),
            name: "n".into(),
            artist: "a".into(),
            pitch: vec![60.0],
        };
        write_file(&path, &[rec("1"), rec("2")]).unwrap();
        write_file(&path, &[rec("3")]).unwrap();
        let records = read_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(records, vec![rec("3")]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_file(Path::new("/nonexistent/humsearch/songs.txt")).unwrap_err();
        assert!(matches!(err, DbError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/humsearch/songs.txt"));
    }
}
