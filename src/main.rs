//! `archway` binary: lists (or extracts) the contents of one or more
//! archives, auto-detecting format and printing a checksum per member.
//!
//! Ported from the original implementation's `archivey/cli.py` main loop:
//! per-file open, per-member checksum + permission-string listing, `--info`
//! early exit, continue-past-errors rather than abort-on-first.

use archway::config::{ArchiveyConfig, OverwriteMode};
use archway::progress::Progress;
use archway::stream::BoxStream;
use archway::utils::format_mode;
use archway::{open_archive, ArchiveError, ArchiveMember, ArchiveReader, OpenOptions};
use clap::Parser;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use std::process::ExitCode;

mod cli;

use cli::Cli;

fn main() -> ExitCode {
    let args = Cli::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut any_errors = false;

    for path in &args.files {
        if let Err(e) = process_file(path, &args) {
            eprintln!("archway: {}: {e}", path.display());
            any_errors = true;
        }
    }

    if any_errors {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn process_file(path: &Path, args: &Cli) -> archway::Result<()> {
    println!("== {} ==", path.display());

    let config = ArchiveyConfig {
        use_rar_stream: args.use_rar_stream,
        use_libarchive: args.use_libarchive,
        use_single_file_stored_metadata: args.use_stored_metadata,
        overwrite_mode: OverwriteMode::Overwrite,
        ..Default::default()
    };

    let mut opts = OpenOptions::default()
        .with_config(config)
        .streaming_only(args.stream);
    if let Some(pwd) = &args.password {
        opts = opts.with_password(pwd.clone());
    }

    let mut reader = open_archive(path, opts)?;

    let info = reader.get_archive_info()?;
    println!("format: {:?}", info.format);
    if let Some(version) = &info.version {
        println!("version: {version}");
    }
    if info.is_solid {
        println!("solid: true");
    }
    if let Some(comment) = &info.comment {
        println!("comment: {comment}");
    }

    if args.info {
        return Ok(());
    }

    if let Some(dest) = &args.extract_to {
        return extract_one(reader.as_mut(), dest, args);
    }

    if args.stream {
        list_streaming(reader.as_mut(), args)
    } else {
        list_random_access(reader.as_mut(), args)
    }
}

fn list_random_access(reader: &mut dyn ArchiveReader, args: &Cli) -> archway::Result<()> {
    let members = reader.get_members()?;
    let progress = Progress::new_items(!args.hide_progress, members.len() as u64, args.verbose);

    for (i, member) in members.iter().enumerate() {
        let row = match describe(reader, &member.clone(), args.password.as_deref()) {
            Ok(row) => row,
            Err(e) => {
                eprintln!("  ! {}: {e}", member.filename);
                progress.set_position(i as u64 + 1);
                continue;
            }
        };
        println!("{row}");
        progress.set_position(i as u64 + 1);
    }
    progress.finish();

    Ok(())
}

fn list_streaming(reader: &mut dyn ArchiveReader, args: &Cli) -> archway::Result<()> {
    let progress = Progress::new_items(!args.hide_progress, 0, args.verbose);
    let mut count = 0u64;

    while let Some((member, stream)) = reader.next_member_io(args.password.as_deref())? {
        match stream {
            Some(mut stream) => {
                let (size, sha256, crc32) = hash_stream(&mut stream)?;
                println!(
                    "{} {:>10} sha256:{sha256} crc32:{crc32:08x} {}",
                    format_type_and_mode(&member),
                    member.file_size.unwrap_or(size),
                    member.filename
                );
            }
            None => eprintln!("  ! {}: failed to open", member.filename),
        }
        count += 1;
        progress.set_length(count);
        progress.set_position(count);
    }
    progress.finish();

    for (member, err) in reader.take_failures() {
        eprintln!("  ! {}: {err}", member.filename);
    }

    Ok(())
}

fn describe(
    reader: &mut dyn ArchiveReader,
    member: &ArchiveMember,
    pwd: Option<&str>,
) -> archway::Result<String> {
    let mode_str = format_type_and_mode(member);
    let size_str = format_size(member.file_size.unwrap_or(0));

    if member.is_dir() {
        return Ok(format!("{mode_str} {size_str:>10}            {}", member.filename));
    }
    if member.is_symlink() || member.is_hardlink() {
        let target = member.link_target.as_deref().unwrap_or("?");
        return Ok(format!(
            "{mode_str} {size_str:>10}            {} -> {target}",
            member.filename
        ));
    }

    let mut stream = reader.open(member, pwd)?;
    let (_, sha256, crc32) = hash_stream(&mut stream)?;
    Ok(format!(
        "{mode_str} {size_str:>10} sha256:{sha256} crc32:{crc32:08x} {}",
        member.filename
    ))
}

fn format_type_and_mode(member: &ArchiveMember) -> String {
    format_mode(member.mode, member.member_type)
}

fn format_size(size: u64) -> String {
    size.to_string()
}

fn hash_stream(stream: &mut BoxStream) -> archway::Result<(u64, String, u32)> {
    let mut hasher = Sha256::new();
    let mut crc = crc32fast::Hasher::new();
    let mut stats = archway::io::StatsIO::new(stream);
    let mut buf = [0u8; 64 * 1024];

    loop {
        let n = stats.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        crc.update(&buf[..n]);
    }

    Ok((stats.bytes_read(), format!("{:x}", hasher.finalize()), crc.finalize()))
}

fn extract_one(reader: &mut dyn ArchiveReader, dest: &Path, _args: &Cli) -> archway::Result<()> {
    let report = reader.extractall(dest)?;
    println!("extracted {} member(s) to {}", report.extracted.len(), dest.display());
    for (member, err) in &report.failures {
        eprintln!("  ! {}: {err}", member.filename);
    }
    if report.failures.is_empty() {
        Ok(())
    } else {
        Err(ArchiveError::format(format!(
            "{} member(s) failed to extract",
            report.failures.len()
        )))
    }
}
