//! Archive extraction
//!
//! Runtime distributions ship as `.tar.gz`, `.tar` or `.zip` with a single
//! top-level directory. The format comes from the download URI when it has a
//! recognizable suffix and from the file's magic bytes otherwise.

use crate::dependency::cache::artifact_file_name;
use crate::error::{JvmError, JvmResult};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

#[cfg(unix)]
const S_IFMT: u32 = 0o170000;
#[cfg(unix)]
const S_IFLNK: u32 = 0o120000;

/// Supported archive encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Tar,
    Zip,
}

impl ArchiveFormat {
    /// Infer the format from the file name at the end of a URI
    pub fn from_uri(uri: &str) -> Option<Self> {
        let name = artifact_file_name(uri).to_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }

    /// Infer the format from the leading bytes of a file
    pub fn sniff(path: &Path) -> JvmResult<Option<Self>> {
        let file =
            File::open(path).map_err(|e| JvmError::io(format!("opening {}", path.display()), e))?;

        let mut head = Vec::with_capacity(262);
        file.take(262)
            .read_to_end(&mut head)
            .map_err(|e| JvmError::io(format!("reading {}", path.display()), e))?;

        let format = if head.starts_with(&[0x1f, 0x8b]) {
            Some(Self::TarGz)
        } else if head.starts_with(b"PK\x03\x04") {
            Some(Self::Zip)
        } else if head.get(257..262) == Some(b"ustar".as_slice()) {
            Some(Self::Tar)
        } else {
            None
        };
        Ok(format)
    }

    /// URI suffix first, then content sniffing
    pub fn detect(uri: &str, path: &Path) -> JvmResult<Self> {
        if let Some(format) = Self::from_uri(uri) {
            return Ok(format);
        }
        Self::sniff(path)?.ok_or_else(|| JvmError::ArchiveFormat(path.to_path_buf()))
    }
}

/// Expand `archive` into `dest`, dropping `strip_components` leading path
/// components from every entry.
///
/// Entries whose path is absolute or climbs out of the destination are
/// skipped, as are entries that vanish entirely after stripping. Symbolic
/// links are only created when their target stays inside the destination,
/// and nothing is written through a directory that resolves outside it.
pub fn extract(
    archive: &Path,
    format: ArchiveFormat,
    dest: &Path,
    strip_components: usize,
) -> JvmResult<()> {
    debug!(
        "Expanding {} ({:?}) to {}",
        archive.display(),
        format,
        dest.display()
    );

    fs::create_dir_all(dest)
        .map_err(|e| JvmError::io(format!("creating {}", dest.display()), e))?;
    let root = fs::canonicalize(dest)
        .map_err(|e| JvmError::io(format!("resolving {}", dest.display()), e))?;

    let file = File::open(archive)
        .map_err(|e| JvmError::io(format!("opening {}", archive.display()), e))?;

    match format {
        ArchiveFormat::TarGz => extract_tar(GzDecoder::new(file), archive, &root, strip_components),
        ArchiveFormat::Tar => extract_tar(file, archive, &root, strip_components),
        ArchiveFormat::Zip => extract_zip(file, archive, &root, strip_components),
    }
}

fn archive_error(archive: &Path, reason: impl ToString) -> JvmError {
    JvmError::Archive {
        path: archive.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn extract_tar<R: Read>(
    reader: R,
    archive: &Path,
    dest: &Path,
    strip_components: usize,
) -> JvmResult<()> {
    let mut tar = tar::Archive::new(reader);
    tar.set_preserve_permissions(true);

    let entries = tar.entries().map_err(|e| archive_error(archive, e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| archive_error(archive, e))?;
        let path = entry
            .path()
            .map_err(|e| archive_error(archive, e))?
            .into_owned();

        let Some(relative) = strip_path(&path, strip_components) else {
            continue;
        };
        let Some(target) = prepare_target(dest, &relative)? else {
            continue;
        };

        match entry.header().entry_type() {
            // Hard link targets are archive paths and need the same stripping
            tar::EntryType::Link => {
                let link = entry.link_name().map_err(|e| archive_error(archive, e))?;
                if let Some(source) = link.and_then(|l| strip_path(&l, strip_components)) {
                    let source = dest.join(source);
                    fs::hard_link(&source, &target).map_err(|e| {
                        JvmError::io(
                            format!("linking {} to {}", target.display(), source.display()),
                            e,
                        )
                    })?;
                }
                continue;
            }
            tar::EntryType::Symlink => {
                let link = entry.link_name().map_err(|e| archive_error(archive, e))?;
                if !link.is_some_and(|l| link_within(&relative, &l)) {
                    debug!("Skipping link {} leading outside the layer", path.display());
                    continue;
                }
            }
            _ => {}
        }

        entry
            .unpack(&target)
            .map_err(|e| JvmError::io(format!("writing {}", target.display()), e))?;
    }
    Ok(())
}

fn extract_zip(file: File, archive: &Path, dest: &Path, strip_components: usize) -> JvmResult<()> {
    let mut zip = zip::ZipArchive::new(file).map_err(|e| archive_error(archive, e))?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| archive_error(archive, e))?;
        let Some(name) = entry.enclosed_name() else {
            continue;
        };
        let Some(relative) = strip_path(&name, strip_components) else {
            continue;
        };
        let Some(target) = prepare_target(dest, &relative)? else {
            continue;
        };

        if entry.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| JvmError::io(format!("creating {}", target.display()), e))?;
            continue;
        }

        #[cfg(unix)]
        if entry.unix_mode().is_some_and(|mode| mode & S_IFMT == S_IFLNK) {
            let mut link = String::new();
            entry
                .read_to_string(&mut link)
                .map_err(|e| archive_error(archive, e))?;
            if !link_within(&relative, Path::new(&link)) {
                debug!("Skipping link {} leading outside the layer", relative.display());
                continue;
            }
            std::os::unix::fs::symlink(&link, &target)
                .map_err(|e| JvmError::io(format!("linking {}", target.display()), e))?;
            continue;
        }

        let mut out = File::create(&target)
            .map_err(|e| JvmError::io(format!("creating {}", target.display()), e))?;
        io::copy(&mut entry, &mut out)
            .map_err(|e| JvmError::io(format!("writing {}", target.display()), e))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(mode))
                .map_err(|e| JvmError::io(format!("chmod {}", target.display()), e))?;
        }
    }
    Ok(())
}

/// Resolve where an entry lands, creating its parent directories.
///
/// Returns `None` when an already extracted link would carry the entry
/// outside `root`. A link already sitting at the target is removed so the
/// entry replaces it instead of writing through it.
fn prepare_target(root: &Path, relative: &Path) -> JvmResult<Option<PathBuf>> {
    let target = root.join(relative);
    if !parent_within(root, &target) {
        debug!("Skipping {} outside {}", relative.display(), root.display());
        return Ok(None);
    }
    create_parent(&target)?;

    if fs::symlink_metadata(&target).is_ok_and(|m| m.file_type().is_symlink()) {
        fs::remove_file(&target)
            .map_err(|e| JvmError::io(format!("replacing {}", target.display()), e))?;
    }
    Ok(Some(target))
}

/// Whether the deepest existing ancestor of `target` resolves inside `root`
fn parent_within(root: &Path, target: &Path) -> bool {
    let mut ancestor = target.parent();
    while let Some(dir) = ancestor {
        if fs::symlink_metadata(dir).is_ok() {
            return fs::canonicalize(dir).is_ok_and(|resolved| resolved.starts_with(root));
        }
        ancestor = dir.parent();
    }
    false
}

/// Whether a link at `relative` pointing to `link` stays inside the destination
fn link_within(relative: &Path, link: &Path) -> bool {
    let mut depth = relative.components().count().saturating_sub(1);
    for component in link.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

fn create_parent(path: &Path) -> JvmResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| JvmError::io(format!("creating {}", parent.display()), e))?;
    }
    Ok(())
}

/// Drop leading components, rejecting anything that is not a plain relative path
fn strip_path(path: &Path, strip_components: usize) -> Option<PathBuf> {
    let mut normal = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normal.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }

    let stripped: PathBuf = normal.into_iter().skip(strip_components).collect();
    if stripped.as_os_str().is_empty() {
        None
    } else {
        Some(stripped)
    }
}
