//! scoped, ambient archive-reading configuration
//!
//! Mirrors the original implementation's `contextvars.ContextVar` +
//! `@contextmanager default_config` pattern with a thread-local stack: each
//! thread sees its own nested scopes, and leaving a scope always restores the
//! previous value, even on panic-unwind.

use std::cell::RefCell;

/// overwrite policy used by the extraction engine on a name collision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwriteMode {
    #[default]
    Overwrite,
    Skip,
    Error,
}

/// named built-in extraction filter; `Custom` carries no function pointer
/// here (callers that need a custom filter pass it directly to `extract`
/// rather than through ambient config)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionFilter {
    FullyTrusted,
    #[default]
    Tar,
    Data,
}

/// ambient configuration recognized by the detector, stream layer, and
/// per-format readers
#[derive(Debug, Clone)]
pub struct ArchiveyConfig {
    pub use_rar_stream: bool,
    pub use_libarchive: bool,
    pub use_single_file_stored_metadata: bool,
    pub use_rapidgzip: bool,
    pub use_indexed_bzip2: bool,
    pub use_python_xz: bool,
    pub use_zstandard: bool,
    pub tar_check_integrity: bool,
    pub sevenzip_read_link_targets_eagerly: bool,
    pub overwrite_mode: OverwriteMode,
    pub extraction_filter: ExtractionFilter,
}

impl Default for ArchiveyConfig {
    fn default() -> Self {
        Self {
            use_rar_stream: false,
            use_libarchive: false,
            use_single_file_stored_metadata: true,
            use_rapidgzip: false,
            use_indexed_bzip2: false,
            use_python_xz: false,
            use_zstandard: true,
            tar_check_integrity: true,
            sevenzip_read_link_targets_eagerly: false,
            overwrite_mode: OverwriteMode::Overwrite,
            extraction_filter: ExtractionFilter::Tar,
        }
    }
}

thread_local! {
    static CONFIG_STACK: RefCell<Vec<ArchiveyConfig>> = const { RefCell::new(Vec::new()) };
}

/// the config visible to the calling thread right now: the top of the
/// thread-local scope stack, or the default if no scope is active
pub fn current_config() -> ArchiveyConfig {
    CONFIG_STACK.with(|stack| stack.borrow().last().cloned().unwrap_or_default())
}

/// RAII guard returned by [`push_default_config`]; popping the scope happens
/// in `Drop`, so it runs even if the scope body panics
pub struct ConfigScopeGuard {
    _private: (),
}

impl Drop for ConfigScopeGuard {
    fn drop(&mut self) {
        CONFIG_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// push `config` as the ambient config for the calling thread until the
/// returned guard is dropped
pub fn push_default_config(config: ArchiveyConfig) -> ConfigScopeGuard {
    CONFIG_STACK.with(|stack| stack.borrow_mut().push(config));
    ConfigScopeGuard { _private: () }
}

/// run `f` with `config` as the ambient configuration for its duration
pub fn with_default_config<T>(config: ArchiveyConfig, f: impl FnOnce() -> T) -> T {
    let _guard = push_default_config(config);
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_scopes_restore_on_drop() {
        assert_eq!(current_config().overwrite_mode, OverwriteMode::Overwrite);
        {
            let _outer = push_default_config(ArchiveyConfig {
                overwrite_mode: OverwriteMode::Skip,
                ..Default::default()
            });
            assert_eq!(current_config().overwrite_mode, OverwriteMode::Skip);
            {
                let _inner = push_default_config(ArchiveyConfig {
                    overwrite_mode: OverwriteMode::Error,
                    ..Default::default()
                });
                assert_eq!(current_config().overwrite_mode, OverwriteMode::Error);
            }
            assert_eq!(current_config().overwrite_mode, OverwriteMode::Skip);
        }
        assert_eq!(current_config().overwrite_mode, OverwriteMode::Overwrite);
    }

    #[test]
    fn with_default_config_restores_even_on_early_return() {
        let run = || -> Option<()> {
            let _guard = push_default_config(ArchiveyConfig {
                overwrite_mode: OverwriteMode::Error,
                ..Default::default()
            });
            None
        };
        run();
        assert_eq!(current_config().overwrite_mode, OverwriteMode::Overwrite);
    }
}
