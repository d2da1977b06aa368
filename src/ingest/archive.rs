use flate2::read::GzDecoder;
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Component, Path, PathBuf};

pub const SUPPORTED_ARCHIVE_EXTENSIONS: [&str; 5] = [".zip", ".tar", ".tar.gz", ".tgz", ".gz"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
}

impl ArchiveFormat {
    /// Detects the format from the (case-insensitive) file name suffix.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") || lower.ends_with(".gz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Tar => "tar",
            Self::TarGz => "tar.gz",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("unsupported archive format for `{0}`")]
    Unsupported(String),
    #[error("archive io failed at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("archive is not readable: {0}")]
    Corrupt(String),
    #[error("archive entry `{0}` escapes the extraction directory")]
    UnsafeEntry(String),
}

fn io_at(path: &Path) -> impl FnOnce(io::Error) -> ArchiveError + '_ {
    move |source| ArchiveError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Normalizes an archive entry name into a relative path. Absolute names and
/// names with `..` components return `None`.
pub fn safe_relative_path(name: &str) -> Option<PathBuf> {
    let normalized = name.replace('\\', "/");
    let mut out = PathBuf::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if out.as_os_str().is_empty() {
        return None;
    }
    Some(out)
}

/// Lists the file entries of an in-memory archive. Directory entries are
/// skipped; a name that would escape the extraction directory fails the
/// listing the same way it fails [`extract_archive`].
pub fn entry_names(bytes: &[u8], format: ArchiveFormat) -> Result<Vec<String>, ArchiveError> {
    match format {
        ArchiveFormat::Zip => {
            let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
                .map_err(|err| ArchiveError::Corrupt(err.to_string()))?;
            let mut names = Vec::new();
            for index in 0..archive.len() {
                let entry = archive
                    .by_index(index)
                    .map_err(|err| ArchiveError::Corrupt(err.to_string()))?;
                let name = checked_name(entry.name())?;
                if !entry.is_dir() {
                    names.push(name);
                }
            }
            Ok(names)
        }
        ArchiveFormat::Tar => tar_entry_names(Cursor::new(bytes)),
        ArchiveFormat::TarGz => tar_entry_names(GzDecoder::new(Cursor::new(bytes))),
    }
}

fn tar_entry_names<R: Read>(reader: R) -> Result<Vec<String>, ArchiveError> {
    let mut archive = tar::Archive::new(reader);
    let entries = archive
        .entries()
        .map_err(|err| ArchiveError::Corrupt(err.to_string()))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| ArchiveError::Corrupt(err.to_string()))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry
            .path()
            .map_err(|err| ArchiveError::Corrupt(err.to_string()))?;
        names.push(checked_name(&path.to_string_lossy())?);
    }
    Ok(names)
}

fn checked_name(name: &str) -> Result<String, ArchiveError> {
    match safe_relative_path(name) {
        Some(_) => Ok(name.to_string()),
        None => Err(ArchiveError::UnsafeEntry(name.to_string())),
    }
}

/// Extracts `archive_path` into `dest`, returning the written files. Only
/// regular files are materialized; links and special entries are skipped.
pub fn extract_archive(
    archive_path: &Path,
    format: ArchiveFormat,
    dest: &Path,
) -> Result<Vec<PathBuf>, ArchiveError> {
    fs::create_dir_all(dest).map_err(io_at(dest))?;
    let file = fs::File::open(archive_path).map_err(io_at(archive_path))?;
    match format {
        ArchiveFormat::Zip => extract_zip(file, dest),
        ArchiveFormat::Tar => extract_tar(file, dest),
        ArchiveFormat::TarGz => extract_tar(GzDecoder::new(file), dest),
    }
}

fn extract_zip(file: fs::File, dest: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let mut archive =
        zip::ZipArchive::new(file).map_err(|err| ArchiveError::Corrupt(err.to_string()))?;
    let mut written = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|err| ArchiveError::Corrupt(err.to_string()))?;
        let name = entry.name().to_string();
        let relative =
            safe_relative_path(&name).ok_or_else(|| ArchiveError::UnsafeEntry(name.clone()))?;
        let target = dest.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(io_at(&target))?;
            continue;
        }
        write_entry(&mut entry, &target)?;
        written.push(target);
    }
    Ok(written)
}

fn extract_tar<R: Read>(reader: R, dest: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let mut archive = tar::Archive::new(reader);
    let entries = archive
        .entries()
        .map_err(|err| ArchiveError::Corrupt(err.to_string()))?;
    let mut written = Vec::new();
    for entry in entries {
        let mut entry = entry.map_err(|err| ArchiveError::Corrupt(err.to_string()))?;
        let name = entry
            .path()
            .map_err(|err| ArchiveError::Corrupt(err.to_string()))?
            .to_string_lossy()
            .into_owned();
        let entry_type = entry.header().entry_type();
        if !entry_type.is_file() && !entry_type.is_dir() {
            continue;
        }
        let relative =
            safe_relative_path(&name).ok_or_else(|| ArchiveError::UnsafeEntry(name.clone()))?;
        let target = dest.join(relative);
        if entry_type.is_dir() {
            fs::create_dir_all(&target).map_err(io_at(&target))?;
            continue;
        }
        write_entry(&mut entry, &target)?;
        written.push(target);
    }
    Ok(written)
}

fn write_entry(reader: &mut impl Read, target: &Path) -> Result<(), ArchiveError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(io_at(parent))?;
    }
    let mut out = fs::File::create(target).map_err(io_at(target))?;
    io::copy(reader, &mut out).map_err(io_at(target))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_detection_is_case_insensitive() {
        assert_eq!(ArchiveFormat::from_file_name("Docs.ZIP"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::from_file_name("a.tar"), Some(ArchiveFormat::Tar));
        assert_eq!(ArchiveFormat::from_file_name("a.tar.gz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_file_name("a.tgz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_file_name("a.gz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_file_name("a.rar"), None);
        assert_eq!(ArchiveFormat::from_file_name("zip"), None);
    }

    #[test]
    fn traversal_names_are_rejected() {
        assert_eq!(safe_relative_path("docs/a.md"), Some(PathBuf::from("docs/a.md")));
        assert_eq!(safe_relative_path("./docs/a.md"), Some(PathBuf::from("docs/a.md")));
        assert_eq!(safe_relative_path("../a.md"), None);
        assert_eq!(safe_relative_path("docs/../../a.md"), None);
        assert_eq!(safe_relative_path("/etc/passwd"), None);
        assert_eq!(safe_relative_path("..\\evil.md"), None);
        assert_eq!(safe_relative_path("./"), None);
    }
}
