use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::NamedTempFile;

use crate::domain::RunAccession;
use crate::error::FetchError;

/// True when `name` belongs to `run`: the accession followed by a non-digit
/// and a `.fastq` component, e.g. `SRR1_1.fastq.gz` but not `SRR12_1.fastq`.
pub fn is_run_fastq(name: &str, run: &RunAccession) -> bool {
    let Some(rest) = name.strip_prefix(run.as_str()) else {
        return false;
    };
    let boundary = rest.chars().next().is_some_and(|ch| !ch.is_ascii_digit());
    boundary && rest.contains(".fastq")
}

pub fn find_run_files(dir: &Path, run: &RunAccession) -> Vec<PathBuf> {
    list_files(dir)
        .into_iter()
        .filter(|path| file_name(path).is_some_and(|name| is_run_fastq(name, run)))
        .collect()
}

pub fn find_uncompressed_fastq(dir: &Path, run: &RunAccession) -> Vec<PathBuf> {
    find_run_files(dir, run)
        .into_iter()
        .filter(|path| file_name(path).is_some_and(|name| name.ends_with(".fastq")))
        .collect()
}

fn list_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|value| value.to_str())
}

pub fn gzip_in_place(path: &Path) -> Result<PathBuf, FetchError> {
    let mut target = path.as_os_str().to_owned();
    target.push(".gz");
    let target = PathBuf::from(target);

    let input = fs::File::open(path)
        .map_err(|err| FetchError::Compression(format!("open {}: {err}", path.display())))?;
    let output = fs::File::create(&target)
        .map_err(|err| FetchError::Compression(format!("create {}: {err}", target.display())))?;

    let mut reader = BufReader::new(input);
    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
    let written = io::copy(&mut reader, &mut encoder)
        .and_then(|_| encoder.finish())
        .and_then(|mut writer| writer.flush());
    if let Err(err) = written {
        let _ = fs::remove_file(&target);
        return Err(FetchError::Compression(format!("{}: {err}", path.display())));
    }

    fs::remove_file(path)
        .map_err(|err| FetchError::Compression(format!("remove {}: {err}", path.display())))?;
    Ok(target)
}

pub fn ensure_dir(path: &Path) -> Result<(), FetchError> {
    fs::create_dir_all(path)
        .map_err(|err| FetchError::Filesystem(format!("create {}: {err}", path.display())))
}

pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), FetchError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    ensure_dir(parent)?;
    let mut tmp =
        NamedTempFile::new_in(parent).map_err(|err| FetchError::Filesystem(err.to_string()))?;
    tmp.write_all(content)
        .map_err(|err| FetchError::Filesystem(err.to_string()))?;
    tmp.persist(path)
        .map_err(|err| FetchError::Filesystem(format!("persist {}: {}", path.display(), err.error)))?;
    Ok(())
}

#[cfg(unix)]
pub fn make_executable(path: &Path) -> Result<(), FetchError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .map_err(|err| FetchError::Filesystem(format!("chmod {}: {err}", path.display())))
}

#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> Result<(), FetchError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;

    use super::*;

    fn run(value: &str) -> RunAccession {
        value.parse().unwrap()
    }

    #[test]
    fn run_fastq_matching_respects_accession_boundary() {
        let srr = run("SRR12");
        assert!(is_run_fastq("SRR12_1.fastq.gz", &srr));
        assert!(is_run_fastq("SRR12.fastq", &srr));
        assert!(!is_run_fastq("SRR123_1.fastq", &srr));
        assert!(!is_run_fastq("SRR12_DOWNLOAD_REQUIRED.txt", &srr));
        assert!(!is_run_fastq("SRR12", &srr));
    }

    #[test]
    fn gzip_replaces_original() {
        let temp = tempfile::tempdir().unwrap();
        let fastq = temp.path().join("SRR1_1.fastq");
        fs::write(&fastq, b"@r1\nACGT\n+\nIIII\n").unwrap();

        let target = gzip_in_place(&fastq).unwrap();
        assert!(!fastq.exists());
        assert_eq!(target, temp.path().join("SRR1_1.fastq.gz"));

        let mut decoded = String::new();
        GzDecoder::new(fs::File::open(&target).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "@r1\nACGT\n+\nIIII\n");
    }

    #[test]
    fn uncompressed_listing_skips_gz() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("SRR1_1.fastq"), b"").unwrap();
        fs::write(temp.path().join("SRR1_2.fastq.gz"), b"").unwrap();
        let found = find_uncompressed_fastq(temp.path(), &run("SRR1"));
        assert_eq!(found, vec![temp.path().join("SRR1_1.fastq")]);
        assert_eq!(find_run_files(temp.path(), &run("SRR1")).len(), 2);
    }
}
