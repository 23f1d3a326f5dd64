//! small filesystem/formatting helpers shared by the extraction engine and
//! the CLI
//!
//! `apply_mtime`/`apply_permissions` are kept from the teacher almost
//! verbatim, generalized to take the timestamp/mode directly rather than a
//! `std::fs::Metadata` so the extraction engine (`src/extract.rs`) can apply
//! an `ArchiveMember`'s stored metadata instead of copying a source file's.
//! Everything else in the teacher's original `utils.rs` (`strip_components`
//! path sanitization, directory-size walking, the interactive overwrite
//! prompt) belonged to the archive-creation and old extraction paths and has
//! no counterpart here.

use crate::error::Result;
use filetime::FileTime;
use std::path::Path;
use std::time::SystemTime;

pub fn apply_mtime(path: &Path, system_time: SystemTime) -> Result<()> {
    let file_time = FileTime::from_system_time(system_time);
    filetime::set_file_mtime(path, file_time)?;
    Ok(())
}

#[cfg(unix)]
pub fn apply_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let permissions = std::fs::Permissions::from_mode(mode & 0o7777);
    std::fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
pub fn apply_permissions(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// renders a member's `mode`/type as an `ls -l`-style permission string, e.g.
/// `drwxr-xr-x` or `-rw-r--r--`; ported from the original implementation's
/// `cli.format_mode()`
pub fn format_mode(mode: Option<u32>, member_type: crate::model::MemberType) -> String {
    use crate::model::MemberType;

    let type_char = match member_type {
        MemberType::Dir => 'd',
        MemberType::Symlink => 'l',
        _ => '-',
    };

    let Some(mode) = mode else {
        return format!("{type_char}?????????");
    };

    const FLAGS: [(u32, char); 9] = [
        (0o400, 'r'),
        (0o200, 'w'),
        (0o100, 'x'),
        (0o040, 'r'),
        (0o020, 'w'),
        (0o010, 'x'),
        (0o004, 'r'),
        (0o002, 'w'),
        (0o001, 'x'),
    ];

    let mut out = String::with_capacity(10);
    out.push(type_char);
    for (bit, ch) in FLAGS {
        out.push(if mode & bit != 0 { ch } else { '-' });
    }
    out
}

/// lower-case hex encoding for opaque binary attributes (e.g. a ZIP extra
/// field or a gzip `FEXTRA` block) stashed in an `extra` bag as a string
pub fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// format bytes in human-readable form, e.g. `1.50 MiB`
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{bytes} {}", UNITS[unit_index])
    } else {
        format!("{size:.2} {}", UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KiB");
        assert_eq!(format_bytes(1536), "1.50 KiB");
        assert_eq!(format_bytes(1024 * 1024), "1.00 MiB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.00 GiB");
        assert_eq!(format_bytes(1024_u64.pow(4)), "1.00 TiB");
        assert_eq!(format_bytes(1024_u64.pow(5)), "1024.00 TiB");
    }

    #[cfg(unix)]
    #[test]
    fn apply_permissions_sets_mode_bits() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.txt");
        fs::write(&path, b"hi").unwrap();
        apply_permissions(&path, 0o640)?;
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
        Ok(())
    }

    #[test]
    fn hex_encode_renders_lowercase_pairs() {
        assert_eq!(hex_encode(&[]), "");
        assert_eq!(hex_encode(&[0x00, 0xAB, 0xff]), "00abff");
    }

    #[test]
    fn format_mode_renders_type_and_permission_bits() {
        use crate::model::MemberType;
        assert_eq!(format_mode(Some(0o755), MemberType::Dir), "drwxr-xr-x");
        assert_eq!(format_mode(Some(0o644), MemberType::File), "-rw-r--r--");
        assert_eq!(format_mode(None, MemberType::File), "-?????????");
    }

    #[test]
    fn apply_mtime_sets_modification_time() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.txt");
        fs::write(&path, b"hi").unwrap();
        let target = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000);
        apply_mtime(&path, target)?;
        let mtime = fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(
            mtime
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap()
                .as_secs(),
            1_000_000
        );
        Ok(())
    }
}
