//! the extraction engine: overwrite policy, link materialization, metadata
//! application (C8)

use crate::config::{self, OverwriteMode};
use crate::error::{ArchiveError, Result};
use crate::filter;
use crate::model::{ArchiveMember, MemberType};
use crate::reader::{ArchiveReader, MemberKey};
use crate::utils::{apply_mtime, apply_permissions};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// options for a single `extract`/`extractall` call; any `None` field falls
/// back to the ambient [`crate::config::ArchiveyConfig`]
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// restrict extraction to these archive-internal names; `None` extracts
    /// everything
    pub members: Option<Vec<String>>,
    pub filter: Option<config::ExtractionFilter>,
    pub overwrite_mode: Option<OverwriteMode>,
    pub password: Option<String>,
    /// when `false`, a filter violation or I/O failure is recorded into
    /// `ExtractReport::failures` instead of aborting the whole extraction
    pub raise_on_error: bool,
}

/// result of an extraction pass
#[derive(Debug, Default)]
pub struct ExtractReport {
    pub extracted: HashMap<u64, PathBuf>,
    pub failures: Vec<(ArchiveMember, ArchiveError)>,
}

struct DeferredHardlink {
    member: ArchiveMember,
    dest_path: PathBuf,
}

pub fn extract(
    reader: &mut dyn ArchiveReader,
    dest: &Path,
    opts: &ExtractOptions,
) -> Result<ExtractReport> {
    fs::create_dir_all(dest)?;

    let ambient = config::current_config();
    let overwrite_mode = opts.overwrite_mode.unwrap_or(ambient.overwrite_mode);
    let filter_kind = opts.filter.unwrap_or(ambient.extraction_filter);

    let members = reader.get_members()?;
    let wanted: Option<std::collections::HashSet<&str>> = opts
        .members
        .as_ref()
        .map(|names| names.iter().map(|s| s.as_str()).collect());

    let mut report = ExtractReport::default();
    let mut deferred = Vec::new();

    for member in &members {
        if let Some(wanted) = &wanted {
            if !wanted.contains(member.filename.as_str()) {
                continue;
            }
        }

        let filtered = match filter::apply(filter_kind, member) {
            Ok(Some(m)) => m,
            Ok(None) => continue,
            Err(e) => {
                if opts.raise_on_error {
                    return Err(e);
                }
                log::warn!("skipping '{}': {e}", member.filename);
                report.failures.push((member.clone(), e));
                continue;
            }
        };

        let result = extract_one(
            reader,
            dest,
            &filtered,
            overwrite_mode,
            opts.password.as_deref(),
            &mut deferred,
        );

        match result {
            Ok(Some(path)) => {
                report.extracted.insert(filtered.member_id, path);
            }
            Ok(None) => {}
            Err(e) => {
                if opts.raise_on_error {
                    return Err(e);
                }
                log::warn!("failed to extract '{}': {e}", filtered.filename);
                report.failures.push((filtered, e));
            }
        }
    }

    for pending in deferred {
        match materialize_hardlink(reader, &pending, overwrite_mode, &report.extracted) {
            Ok(()) => {
                report
                    .extracted
                    .insert(pending.member.member_id, pending.dest_path);
            }
            Err(e) => {
                if opts.raise_on_error {
                    return Err(e);
                }
                log::warn!("failed to link '{}': {e}", pending.member.filename);
                report.failures.push((pending.member, e));
            }
        }
    }

    Ok(report)
}

/// extracts a single non-hardlink member; hardlinks are pushed onto
/// `deferred` and materialized after every other member has a path on disk
fn extract_one(
    reader: &mut dyn ArchiveReader,
    dest: &Path,
    member: &ArchiveMember,
    overwrite_mode: OverwriteMode,
    password: Option<&str>,
    deferred: &mut Vec<DeferredHardlink>,
) -> Result<Option<PathBuf>> {
    let target = dest.join(&member.filename);

    match member.member_type {
        MemberType::Dir => {
            fs::create_dir_all(&target)?;
            apply_metadata(&target, member, false);
            Ok(Some(target))
        }
        MemberType::Symlink => {
            let link_target = member
                .link_target
                .clone()
                .ok_or_else(|| ArchiveError::format(format!("symlink '{}' has no target", member.filename)))?;
            if !handle_collision(&target, overwrite_mode)? {
                return Ok(None);
            }
            create_symlink(&link_target, &target)?;
            Ok(Some(target))
        }
        MemberType::Hardlink => {
            deferred.push(DeferredHardlink {
                member: member.clone(),
                dest_path: target,
            });
            Ok(None)
        }
        MemberType::File | MemberType::Other => {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            if !handle_collision(&target, overwrite_mode)? {
                return Ok(None);
            }
            let mut stream = reader.open(member, password)?;
            let mut out = fs::File::create(&target)?;
            io::copy(&mut stream, &mut out)?;
            drop(out);
            apply_metadata(&target, member, false);
            Ok(Some(target))
        }
    }
}

fn materialize_hardlink(
    reader: &mut dyn ArchiveReader,
    pending: &DeferredHardlink,
    overwrite_mode: OverwriteMode,
    extracted: &HashMap<u64, PathBuf>,
) -> Result<()> {
    let target_name = pending
        .member
        .link_target
        .clone()
        .ok_or_else(|| ArchiveError::format(format!("hardlink '{}' has no target", pending.member.filename)))?;

    let target_member = reader
        .get_member(MemberKey::Name(target_name.clone()))
        .map_err(|_| ArchiveError::LinkTargetNotFoundError(pending.member.filename.clone()))?;

    let source_path = extracted
        .get(&target_member.member_id)
        .ok_or_else(|| ArchiveError::LinkTargetNotFoundError(pending.member.filename.clone()))?;

    if !handle_collision(&pending.dest_path, overwrite_mode)? {
        return Ok(());
    }
    if let Some(parent) = pending.dest_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::hard_link(source_path, &pending.dest_path)?;
    Ok(())
}

/// returns `Ok(true)` if extraction should proceed, `Ok(false)` if the
/// member should be skipped under `SKIP`
fn handle_collision(path: &Path, mode: OverwriteMode) -> Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    match mode {
        OverwriteMode::Overwrite => {
            if path.is_dir() && !path.is_symlink() {
                // merging into an existing directory is fine
                return Ok(true);
            }
            fs::remove_file(path).or_else(|_| fs::remove_dir_all(path))?;
            Ok(true)
        }
        OverwriteMode::Skip => Ok(false),
        OverwriteMode::Error => Err(ArchiveError::FileExistsError(path.to_path_buf())),
    }
}

#[cfg(unix)]
fn create_symlink(target: &str, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_symlink(target: &str, link: &Path) -> Result<()> {
    std::os::windows::fs::symlink_file(target, link)?;
    Ok(())
}

/// applies permissions and mtime best-effort; failures are logged, never
/// propagated (owner changes are not attempted — no portable, dependency-free
/// way to chown without root, and the corpus carries no crate for it)
fn apply_metadata(path: &Path, member: &ArchiveMember, is_symlink: bool) {
    if is_symlink {
        return;
    }
    if let Some(mode) = member.mode {
        if let Err(e) = apply_permissions(path, mode) {
            log::warn!("could not set permissions on '{}': {e}", path.display());
        }
    }
    if let Some(mtime) = member.mtime {
        if let Err(e) = apply_mtime(path, mtime) {
            log::warn!("could not set mtime on '{}': {e}", path.display());
        }
    }
}
