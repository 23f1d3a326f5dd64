//! extraction-time member filters: path/link/permission sanitization (C8)
//!
//! This module used to hold the teacher's compress-time glob-exclusion
//! `FileFilter` (deciding which files on disk to *add* to an archive being
//! created). That concept has no counterpart once archive creation is out of
//! scope; this is a ground-up replacement for the extraction-time filter
//! concept described in `original_source/src/archivey/api/filters.py`.

use crate::error::{ArchiveError, Result};
use crate::model::{ArchiveMember, MemberType};
use std::path::{Component, Path, PathBuf};

/// a filter function handed to [`crate::reader::MemberIoIter`]: returns a
/// possibly-rewritten member, or `None` to skip it entirely
pub type FilterFn<'a> = &'a dyn Fn(&ArchiveMember) -> Option<ArchiveMember>;

/// dispatches to the named built-in extraction filter; used internally by
/// the extraction engine, which needs the fallible form so a sanitization
/// violation can abort the extraction (see `ExtractOptions::raise_on_error`)
pub fn apply(
    filter: crate::config::ExtractionFilter,
    member: &ArchiveMember,
) -> Result<Option<ArchiveMember>> {
    use crate::config::ExtractionFilter as F;
    match filter {
        F::FullyTrusted => Ok(fully_trusted(member)),
        F::Tar => tar(member),
        F::Data => data(member),
    }
}

/// identity filter: extracts exactly what the archive says, unsanitized.
/// Only appropriate for archives from a fully trusted source.
pub fn fully_trusted(member: &ArchiveMember) -> Option<ArchiveMember> {
    Some(member.clone())
}

/// sanitizes names and link targets, rejecting anything that would escape
/// the destination directory; otherwise preserves the member as-is
pub fn tar(member: &ArchiveMember) -> Result<Option<ArchiveMember>> {
    sanitize(member)
}

/// like [`tar`], but additionally strips the executable bit from regular
/// files and ORs in owner read/write (`0o600`) — a conservative default for
/// archives of unknown provenance
pub fn data(member: &ArchiveMember) -> Result<Option<ArchiveMember>> {
    let Some(mut sanitized) = sanitize(member)? else {
        return Ok(None);
    };
    if sanitized.is_file() {
        let mode = sanitized.mode.unwrap_or(0o644);
        sanitized.mode = Some((mode & !0o111) | 0o600);
    }
    Ok(Some(sanitized))
}

/// shared sanitization logic behind `tar`/`data`: normalizes the name and
/// validates link targets, raising on any containment violation
fn sanitize(member: &ArchiveMember) -> Result<Option<ArchiveMember>> {
    let mut sanitized = member.clone();
    sanitized.filename = sanitize_name(&member.filename)?;

    if let Some(target) = &member.link_target {
        match member.member_type {
            MemberType::Symlink => {
                check_symlink_target(&sanitized.filename, target)?;
            }
            MemberType::Hardlink => {
                // normalized only for the safety check; the stored target
                // stays the original string so name-based resolution
                // (`ArchiveReader::resolve_link`) still matches exactly
                check_hardlink_target(target)?;
            }
            _ => {}
        }
    }

    Ok(Some(sanitized))
}

/// normalizes `name` (collapses `.`/`..`, strips leading separators) and
/// rejects anything that would resolve outside the destination root
pub fn sanitize_name(name: &str) -> Result<String> {
    let is_dir = name.ends_with('/');
    let path = Path::new(name);
    let mut out: Vec<String> = Vec::new();

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                return Err(ArchiveError::not_supported(format!(
                    "archive member '{name}' has an absolute path"
                )));
            }
            Component::ParentDir => {
                if out.pop().is_none() {
                    return Err(ArchiveError::not_supported(format!(
                        "archive member '{name}' escapes the destination directory"
                    )));
                }
            }
            Component::CurDir => {}
            Component::Normal(part) => out.push(part.to_string_lossy().into_owned()),
        }
    }

    let mut joined = out.join("/");
    if is_dir && !joined.is_empty() {
        joined.push('/');
    }
    Ok(joined)
}

/// validates that `dirname(member_name)/target` stays within the
/// destination root, without needing the destination to exist on disk yet
fn check_symlink_target(member_name: &str, target: &str) -> Result<()> {
    let member_dir = Path::new(member_name).parent().unwrap_or(Path::new(""));
    let candidate = member_dir.join(target);
    ensure_contained(&candidate).map_err(|_| {
        ArchiveError::not_supported(format!(
            "symlink '{member_name}' target '{target}' escapes the destination directory"
        ))
    })?;
    Ok(())
}

fn check_hardlink_target(target: &str) -> Result<()> {
    sanitize_name(target)?;
    Ok(())
}

/// a purely lexical containment check: normalizes `.`/`..` in `candidate`
/// (which is relative to the destination root) and rejects any path whose
/// normalized form would need to climb above the root
fn ensure_contained(candidate: &Path) -> std::result::Result<PathBuf, ()> {
    let mut depth: i64 = 0;
    let mut normalized = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => return Err(()),
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return Err(());
                }
                normalized.pop();
            }
            Component::CurDir => {}
            Component::Normal(part) => {
                depth += 1;
                normalized.push(part);
            }
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ArchiveMember;

    fn member(name: &str, ty: MemberType) -> ArchiveMember {
        ArchiveMember::new(name.to_string(), ty)
    }

    #[test]
    fn fully_trusted_passes_through_unchanged() {
        let m = member("a/b.txt", MemberType::File);
        let out = fully_trusted(&m).unwrap();
        assert_eq!(out.filename, "a/b.txt");
    }

    #[test]
    fn tar_filter_normalizes_redundant_segments() {
        let m = member("./a/./b.txt", MemberType::File);
        let out = tar(&m).unwrap().unwrap();
        assert_eq!(out.filename, "a/b.txt");
    }

    #[test]
    fn sanitize_name_rejects_absolute_path() {
        assert!(sanitize_name("/etc/passwd").is_err());
    }

    #[test]
    fn sanitize_name_rejects_parent_escape() {
        assert!(sanitize_name("../../etc/passwd").is_err());
    }

    #[test]
    fn sanitize_name_allows_internal_dotdot_that_stays_contained() {
        assert_eq!(sanitize_name("a/b/../c.txt").unwrap(), "a/c.txt");
    }

    #[test]
    fn data_filter_clears_exec_bit_and_sets_owner_rw() {
        let mut m = member("script.sh", MemberType::File);
        m.mode = Some(0o755);
        let out = data(&m).unwrap().unwrap();
        assert_eq!(out.mode.unwrap() & 0o111, 0);
        assert_eq!(out.mode.unwrap() & 0o600, 0o600);
    }

    #[test]
    fn data_filter_leaves_directory_mode_untouched() {
        let mut m = member("dir/", MemberType::Dir);
        m.mode = Some(0o755);
        let out = data(&m).unwrap().unwrap();
        assert_eq!(out.mode, Some(0o755));
    }

    #[test]
    fn symlink_target_escaping_root_is_rejected() {
        let mut m = member("link.txt", MemberType::Symlink);
        m.link_target = Some("../../etc/passwd".to_string());
        assert!(tar(&m).is_err());
    }

    #[test]
    fn symlink_target_within_root_is_accepted() {
        let mut m = member("sub/link.txt", MemberType::Symlink);
        m.link_target = Some("../sibling.txt".to_string());
        assert!(tar(&m).is_ok());
    }

    #[test]
    fn path_traversal_member_name_is_rejected() {
        let m = member("../../etc/passwd", MemberType::File);
        assert!(tar(&m).is_err());
    }
}
