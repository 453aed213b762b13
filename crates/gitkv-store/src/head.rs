//! The single mutable pointer of a store: the head ref.
//!
//! The ref holds the hex digest of the newest commit, or is absent before
//! the first commit. Ref names are `refs/heads/<branch>` with git-style
//! branch naming:
//! - no whitespace, `~`, `^`, `:`, `?`, `*`, `[`, `\` or NUL
//! - no `..` or `@{`
//! - no leading or trailing `.` or `/`, and no `.lock` suffix
//! - `/`-separated components are non-empty and do not start with `.`

use gitkv_types::Digest;
use tracing::{info, warn};

use crate::backend::{KvBackend, Swap};
use crate::error::{StoreError, StoreResult};

/// Prefix every head ref lives under.
pub const HEADS_PREFIX: &str = "refs/heads/";

const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '\0', '~', '^', ':', '?', '*', '[', '\\'];

/// Check a git-style branch name (the part after `refs/heads/`).
pub fn validate_branch_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("branch name must not be empty".into());
    }
    if let Some(ch) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(format!("contains forbidden character {ch:?}"));
    }
    let reason = if name.contains("..") {
        "must not contain '..'"
    } else if name.contains("@{") {
        "must not contain '@{'"
    } else if name.starts_with(['.', '/']) || name.ends_with(['.', '/']) {
        "must not start or end with '.' or '/'"
    } else if name.ends_with(".lock") {
        "must not end with '.lock'"
    } else if name.split('/').any(|c| c.is_empty() || c.starts_with('.')) {
        "components must be non-empty and must not start with '.'"
    } else {
        return Ok(());
    };
    Err(reason.into())
}

/// Check a full head ref name such as `refs/heads/master`.
pub fn validate_head_ref(name: &str) -> Result<(), String> {
    let branch = name
        .strip_prefix(HEADS_PREFIX)
        .ok_or_else(|| format!("head ref must start with {HEADS_PREFIX:?}"))?;
    validate_branch_name(branch)
}

/// Reads and advances one named head ref in a backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeadRef {
    name: String,
}

impl HeadRef {
    /// Create a handle for `name`, which must be a valid head ref.
    pub fn new(name: impl Into<String>) -> StoreResult<Self> {
        let name = name.into();
        validate_head_ref(&name).map_err(|reason| StoreError::Config(format!("{name}: {reason}")))?;
        Ok(Self { name })
    }

    /// The ref key, e.g. `refs/heads/master`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The commit digest the head points at, if any commit was made.
    pub fn read<B: KvBackend + ?Sized>(&self, backend: &B) -> StoreResult<Option<Digest>> {
        backend
            .get(&self.name)?
            .map(|raw| self.parse(&raw))
            .transpose()
    }

    /// Move the head from `expected` to `new`, failing with
    /// [`StoreError::HeadConflict`] if it no longer points at `expected`.
    pub fn advance<B: KvBackend + ?Sized>(
        &self,
        backend: &B,
        expected: Option<&Digest>,
        new: &Digest,
    ) -> StoreResult<()> {
        let swap = backend.compare_and_swap(
            &self.name,
            expected.map(|d| d.as_str().as_bytes()),
            new.as_str().as_bytes(),
        )?;
        match swap {
            Swap::Swapped => {
                info!(head = %self.name, commit = %new.short_hex(), "advanced head");
                Ok(())
            }
            Swap::Mismatch { actual } => {
                let actual = actual.map(|raw| self.parse(&raw)).transpose()?;
                warn!(
                    head = %self.name,
                    expected = ?expected,
                    actual = ?actual,
                    "head moved concurrently"
                );
                Err(StoreError::HeadConflict {
                    expected: expected.cloned(),
                    actual,
                })
            }
        }
    }

    fn parse(&self, raw: &[u8]) -> StoreResult<Digest> {
        let corrupt = |reason: String| StoreError::CorruptHead {
            name: self.name.clone(),
            reason,
        };
        let text = std::str::from_utf8(raw).map_err(|_| corrupt("not UTF-8".into()))?;
        Digest::from_canonical_hex(text).map_err(|e| corrupt(e.to_string()))
    }
}
