//! the unified reader contract: abstract reader trait, member registration,
//! random-access vs streaming-only modes, link resolution (C6)
//!
//! Per-format adapters (`src/reader/{zip,rar,sevenz,tar,single_file,ar,iso,
//! folder}.rs`) implement [`Backend`]; [`BaseReader`] is the shared
//! registration/indexing machinery they compose around rather than inherit
//! from — Rust has no implementation inheritance, so this mirrors the
//! teacher's trait-plus-free-function composition style seen across
//! `formats::CompressionFormat` and `utils::*`.

pub mod ar;
pub mod folder;
pub mod iso;
#[cfg(feature = "rar")]
pub mod rar;
pub mod sevenz;
pub mod single_file;
pub mod tar;
pub mod zip;

use crate::config::{self, ExtractionFilter};
use crate::error::{ArchiveError, Result};
use crate::extract::{self, ExtractOptions, ExtractReport};
use crate::filter::FilterFn;
use crate::ids;
use crate::model::{ArchiveInfo, ArchiveMember};
use crate::stream::BoxStream;
use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// key used to look up a single member: by archive-internal name or by its
/// process-assigned `member_id`
#[derive(Debug, Clone)]
pub enum MemberKey {
    Name(String),
    Id(u64),
}

impl From<&str> for MemberKey {
    fn from(name: &str) -> Self {
        MemberKey::Name(name.to_string())
    }
}

impl From<String> for MemberKey {
    fn from(name: String) -> Self {
        MemberKey::Name(name)
    }
}

impl From<u64> for MemberKey {
    fn from(id: u64) -> Self {
        MemberKey::Id(id)
    }
}

/// per-format adapter contract; `BaseReader` supplies everything else
/// (registration, indexing, link resolution, extraction) on top of this
pub trait Backend: Send {
    fn archive_info(&self) -> ArchiveInfo;

    /// produce every member, in archive order; called exactly once by
    /// `BaseReader` on first registration. Cheap metadata only — reading
    /// member *content* happens in `open_member`.
    fn members(&mut self) -> Result<Vec<ArchiveMember>>;

    /// open a decompressed byte stream for `member`, previously returned by
    /// `members()`
    fn open_member(&mut self, member: &ArchiveMember, pwd: Option<&str>) -> Result<BoxStream>;
}

/// the state machine every reader progresses through: `New → Open →
/// (Iterating ↔ Idle) → Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    New,
    Open,
    Iterating,
    Idle,
    Closed,
}

/// the public operations every concrete reader exposes
pub trait ArchiveReader: Send {
    fn get_archive_info(&mut self) -> Result<ArchiveInfo>;

    /// random-access only: the full, cached, ordered member list
    fn get_members(&mut self) -> Result<Vec<ArchiveMember>>;

    /// random-access only: O(1) lookup by name or id
    fn get_member(&mut self, key: MemberKey) -> Result<ArchiveMember>;

    /// open a stream for `member`; valid repeatedly and in any order in
    /// random-access mode, valid only for the current member during
    /// streaming-only iteration
    fn open(&mut self, member: &ArchiveMember, pwd: Option<&str>) -> Result<BoxStream>;

    /// advance to the next `(member, stream)` pair in registration order, or
    /// `None` at end of archive. `stream` is `None` when opening that one
    /// member failed (the failure is recorded, retrievable via
    /// `take_failures`); iteration otherwise continues.
    fn next_member_io(
        &mut self,
        pwd: Option<&str>,
    ) -> Result<Option<(ArchiveMember, Option<BoxStream>)>>;

    /// drains the per-member failures accumulated by `next_member_io`
    fn take_failures(&mut self) -> Vec<(ArchiveMember, ArchiveError)>;

    /// follow a SYMLINK/HARDLINK chain to its terminal non-link member;
    /// `None` on an unresolvable target or a detected cycle
    fn resolve_link(&mut self, member: &ArchiveMember) -> Result<Option<ArchiveMember>>;

    fn extract(&mut self, dest: &Path, opts: &ExtractOptions) -> Result<ExtractReport>;

    fn extractall(&mut self, dest: &Path) -> Result<ExtractReport> {
        self.extract(dest, &ExtractOptions::default())
    }

    /// releases the underlying source; idempotent
    fn close(&mut self) -> Result<()>;
}

/// lazily iterates `(member, stream)` pairs by repeatedly calling
/// [`ArchiveReader::next_member_io`], applying an optional filter
pub struct MemberIoIter<'a> {
    reader: &'a mut dyn ArchiveReader,
    pwd: Option<String>,
    filter: Option<FilterFn<'a>>,
    done: bool,
}

impl<'a> MemberIoIter<'a> {
    pub fn new(
        reader: &'a mut dyn ArchiveReader,
        pwd: Option<&str>,
        filter: Option<FilterFn<'a>>,
    ) -> Self {
        Self {
            reader,
            pwd: pwd.map(|s| s.to_string()),
            filter,
            done: false,
        }
    }
}

impl<'a> Iterator for MemberIoIter<'a> {
    type Item = Result<(ArchiveMember, Option<BoxStream>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.reader.next_member_io(self.pwd.as_deref()) {
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Ok(Some((member, stream))) => {
                    if let Some(filter) = &self.filter {
                        match filter(&member) {
                            Some(replaced) => return Some(Ok((replaced, stream))),
                            None => continue,
                        }
                    }
                    return Some(Ok((member, stream)));
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// shared registration/indexing machinery every per-format `Backend` is
/// wrapped in to become a full `ArchiveReader`
pub struct BaseReader {
    backend: Box<dyn Backend>,
    archive_id: u64,
    member_ids: ids::ArchiveIdCounter,
    members: Vec<ArchiveMember>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<u64, usize>,
    registered: bool,
    cursor: usize,
    failures: Vec<(ArchiveMember, ArchiveError)>,
    state: ReaderState,
}

impl BaseReader {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            archive_id: ids::next_id(),
            member_ids: ids::ArchiveIdCounter::new(),
            members: Vec::new(),
            by_name: HashMap::new(),
            by_id: HashMap::new(),
            registered: false,
            cursor: 0,
            failures: Vec::new(),
            state: ReaderState::New,
        }
    }

    fn ensure_registered(&mut self) -> Result<()> {
        if self.registered {
            return Ok(());
        }
        let mut members = self.backend.members()?;
        for member in members.iter_mut() {
            member.archive_id = self.archive_id;
            member.member_id = self.member_ids.next();
            self.by_name.insert(member.filename.clone(), self.members.len());
            self.by_id.insert(member.member_id, self.members.len());
            self.members.push(member.clone());
        }
        let _ = members;
        self.registered = true;
        self.state = ReaderState::Open;
        Ok(())
    }

    fn check_open(&self) -> Result<()> {
        if self.state == ReaderState::Closed {
            return Err(ArchiveError::ClosedError);
        }
        Ok(())
    }
}

impl ArchiveReader for BaseReader {
    fn get_archive_info(&mut self) -> Result<ArchiveInfo> {
        self.check_open()?;
        Ok(self.backend.archive_info())
    }

    fn get_members(&mut self) -> Result<Vec<ArchiveMember>> {
        self.check_open()?;
        self.ensure_registered()?;
        Ok(self.members.clone())
    }

    fn get_member(&mut self, key: MemberKey) -> Result<ArchiveMember> {
        self.check_open()?;
        self.ensure_registered()?;
        let idx = match &key {
            MemberKey::Name(name) => self.by_name.get(name),
            MemberKey::Id(id) => self.by_id.get(id),
        };
        match idx {
            Some(&i) => Ok(self.members[i].clone()),
            None => Err(ArchiveError::MemberNotFoundError(match key {
                MemberKey::Name(name) => name,
                MemberKey::Id(id) => id.to_string(),
            })),
        }
    }

    fn open(&mut self, member: &ArchiveMember, pwd: Option<&str>) -> Result<BoxStream> {
        self.check_open()?;
        self.backend.open_member(member, pwd)
    }

    fn next_member_io(
        &mut self,
        pwd: Option<&str>,
    ) -> Result<Option<(ArchiveMember, Option<BoxStream>)>> {
        self.check_open()?;
        self.ensure_registered()?;
        self.state = ReaderState::Iterating;
        if self.cursor >= self.members.len() {
            self.state = ReaderState::Idle;
            return Ok(None);
        }
        let member = self.members[self.cursor].clone();
        self.cursor += 1;
        match self.backend.open_member(&member, pwd) {
            Ok(stream) => Ok(Some((member, Some(stream)))),
            Err(e) => {
                log::warn!("failed to open member '{}': {e}", member.filename);
                self.failures.push((member.clone(), e));
                Ok(Some((member, None)))
            }
        }
    }

    fn take_failures(&mut self) -> Vec<(ArchiveMember, ArchiveError)> {
        std::mem::take(&mut self.failures)
    }

    fn resolve_link(&mut self, member: &ArchiveMember) -> Result<Option<ArchiveMember>> {
        self.check_open()?;
        self.ensure_registered()?;
        let mut current = member.clone();
        let mut visited = std::collections::HashSet::new();
        let max_hops = self.members.len().max(1);
        for _ in 0..=max_hops {
            if !current.is_symlink() && !current.is_hardlink() {
                return Ok(Some(current));
            }
            if !visited.insert(current.member_id) {
                return Ok(None);
            }
            let Some(target_name) = current.link_target.clone() else {
                return Ok(None);
            };
            match self.by_name.get(&target_name) {
                Some(&idx) => current = self.members[idx].clone(),
                None => return Ok(None),
            }
        }
        Ok(None)
    }

    fn extract(&mut self, dest: &Path, opts: &ExtractOptions) -> Result<ExtractReport> {
        self.check_open()?;
        extract::extract(self, dest, opts)
    }

    fn close(&mut self) -> Result<()> {
        self.state = ReaderState::Closed;
        Ok(())
    }
}

/// enforces the streaming-only contract over any random-access reader:
/// refuses `get_members`/`get_member`, and invalidates a previously-yielded
/// stream as soon as the caller advances past it or opens a new one.
///
/// Grounded on `original_source/src/archivey/core.py`'s
/// `StreamingOnlyArchiveReaderWrapper` dispatch.
pub struct StreamingOnlyWrapper {
    inner: Box<dyn ArchiveReader>,
    valid: Arc<AtomicBool>,
}

impl StreamingOnlyWrapper {
    pub fn new(inner: Box<dyn ArchiveReader>) -> Self {
        Self {
            inner,
            valid: Arc::new(AtomicBool::new(false)),
        }
    }

    fn invalidate_previous(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }
}

impl ArchiveReader for StreamingOnlyWrapper {
    fn get_archive_info(&mut self) -> Result<ArchiveInfo> {
        self.inner.get_archive_info()
    }

    fn get_members(&mut self) -> Result<Vec<ArchiveMember>> {
        Err(ArchiveError::not_supported(
            "get_members is not available on a streaming-only reader",
        ))
    }

    fn get_member(&mut self, _key: MemberKey) -> Result<ArchiveMember> {
        Err(ArchiveError::not_supported(
            "get_member is not available on a streaming-only reader",
        ))
    }

    fn open(&mut self, member: &ArchiveMember, pwd: Option<&str>) -> Result<BoxStream> {
        self.invalidate_previous();
        let stream = self.inner.open(member, pwd)?;
        let valid = Arc::new(AtomicBool::new(true));
        self.valid = valid.clone();
        Ok(Box::new(InvalidatableStream::new(stream, valid)))
    }

    fn next_member_io(
        &mut self,
        pwd: Option<&str>,
    ) -> Result<Option<(ArchiveMember, Option<BoxStream>)>> {
        self.invalidate_previous();
        let result = self.inner.next_member_io(pwd)?;
        Ok(match result {
            None => None,
            Some((member, None)) => Some((member, None)),
            Some((member, Some(stream))) => {
                let valid = Arc::new(AtomicBool::new(true));
                self.valid = valid.clone();
                Some((member, Some(Box::new(InvalidatableStream::new(stream, valid)))))
            }
        })
    }

    fn take_failures(&mut self) -> Vec<(ArchiveMember, ArchiveError)> {
        self.inner.take_failures()
    }

    fn resolve_link(&mut self, member: &ArchiveMember) -> Result<Option<ArchiveMember>> {
        self.inner.resolve_link(member)
    }

    fn extract(&mut self, dest: &Path, opts: &ExtractOptions) -> Result<ExtractReport> {
        self.inner.extract(dest, opts)
    }

    fn close(&mut self) -> Result<()> {
        self.invalidate_previous();
        self.inner.close()
    }
}

/// a stream wrapper that fails every operation once its shared `valid` flag
/// is cleared (the previous member's stream, once the streaming-only reader
/// has advanced)
struct InvalidatableStream {
    inner: BoxStream,
    valid: Arc<AtomicBool>,
}

impl InvalidatableStream {
    fn new(inner: BoxStream, valid: Arc<AtomicBool>) -> Self {
        Self { inner, valid }
    }

    fn check(&self) -> io::Result<()> {
        if self.valid.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::Other,
                ArchiveError::ClosedError.to_string(),
            ))
        }
    }
}

impl Read for InvalidatableStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check()?;
        self.inner.read(buf)
    }
}

impl Seek for InvalidatableStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.check()?;
        self.inner.seek(pos)
    }
}

impl crate::stream::Stream for InvalidatableStream {
    fn seekable(&self) -> bool {
        self.inner.seekable()
    }

    fn size_hint(&self) -> Option<u64> {
        self.inner.size_hint()
    }
}

/// resolves `filter` (an ambient config default, or an explicit override) to
/// the corresponding filtering function
pub fn resolve_filter(filter: Option<ExtractionFilter>) -> ExtractionFilter {
    filter.unwrap_or_else(|| config::current_config().extraction_filter)
}
