use std::path::{Path, PathBuf};

use time::{format_description::FormatItem, macros::format_description, OffsetDateTime, UtcOffset};
use tracing::{debug, warn, Span};

/// Characters that are reserved on at least one common filesystem
const RESERVED_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Maximum number of characters kept from a title
const MAX_TITLE_CHARS: usize = 120;

/// Maximum UTF-8 length of a kept title, leaving room for the rest of
/// the name under the usual 255-byte filename limit
const MAX_TITLE_BYTES: usize = 180;

const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year][month][day][hour][minute][second]");

/// Replace reserved characters with `_` and cut the title to a bounded length.
///
/// The cut happens at whichever comes first of the character and byte caps,
/// always on a character boundary.
pub fn sanitize_title(title: &str) -> String {
    let mut sanitized = String::new();
    for c in title
        .chars()
        .map(|c| if RESERVED_CHARS.contains(&c) { '_' } else { c })
        .take(MAX_TITLE_CHARS)
    {
        if sanitized.len() + c.len_utf8() > MAX_TITLE_BYTES {
            break;
        }
        sanitized.push(c);
    }
    sanitized
}

/// True for the scratch files an engine leaves behind while a download is
/// still running or after it was interrupted.
pub fn is_partial_download(path: &Path) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    let name = name.to_string_lossy();
    name.ends_with(".part")
        || name.ends_with(".ytdl")
        || name.contains(".part-Frag")
        || name.contains(".temp.")
}

/// 8 lowercase hex characters, only meant to avoid collisions
pub fn random_hex8() -> String {
    format!("{:08x}", fastrand::u32(..))
}

/// Builds output file names of the form
/// `<title>_<id>[_<suffix>]_<timestamp>_<hex8>[<ext>]`.
#[derive(Debug, Clone, Copy)]
pub struct FilenameGenerator {
    offset: UtcOffset,
}

impl FilenameGenerator {
    /// The offset must be captured before any thread is spawned,
    /// as reading it afterwards is unsound on some platforms.
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }

    pub fn generate(&self, title: &str, id: &str, suffix: Option<&str>, extension: Option<&str>) -> String {
        let now = OffsetDateTime::now_utc().to_offset(self.offset);
        Self::generate_at(now, title, id, suffix, extension)
    }

    pub fn generate_at(
        now: OffsetDateTime,
        title: &str,
        id: &str,
        suffix: Option<&str>,
        extension: Option<&str>,
    ) -> String {
        let mut filename = format!("{}_{id}", sanitize_title(title));

        if let Some(suffix) = suffix.filter(|s| !s.is_empty()) {
            filename.push('_');
            filename.push_str(suffix);
        }

        // Formatting only fails on descriptions asking for missing components
        let timestamp = now
            .format(TIMESTAMP_FORMAT)
            .unwrap_or_else(|_| now.unix_timestamp().to_string());
        filename.push_str(&format!("_{timestamp}_{}", random_hex8()));

        if let Some(extension) = extension.filter(|s| !s.is_empty()) {
            if !extension.starts_with('.') {
                filename.push('.');
            }
            filename.push_str(extension);
        }

        filename
    }
}

/// Find a file in `directory` whose name starts with `prefix`.
///
/// Partial downloads never match.
///
/// When several files match, the lexically smallest name wins so the
/// result does not depend on the filesystem ordering.
pub fn locate_downloaded(directory: &Path, prefix: &str) -> Option<PathBuf> {
    let entries = match directory.read_dir() {
        Ok(entries) => entries,
        Err(err) => {
            debug!("Could not read {}: {err}", directory.display());
            return None;
        }
    };

    let mut candidates: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
        .map(|entry| entry.path())
        .filter(|path| !is_partial_download(path))
        .collect();

    if candidates.len() > 1 {
        debug!(
            "{} files match prefix '{prefix}', picking the first in lexical order",
            candidates.len()
        );
    }
    candidates.sort();
    candidates.into_iter().next()
}

/// Delete a file, logging instead of failing.
pub fn remove_best_effort(path: &Path, span: &Span) {
    if let Err(err) = std::fs::remove_file(path) {
        warn!(parent: span, "Could not delete {}: {err}", path.display());
    }
}

/// Scratch directory private to one request: `<temp_dir>/<video_id>_<hex8>`.
///
/// Two concurrent requests for the same video never share temp files.
#[derive(Debug)]
pub struct RequestWorkspace {
    path: PathBuf,
}

impl RequestWorkspace {
    pub fn create(temp_dir: &Path, video_id: &str) -> std::io::Result<Self> {
        let path = temp_dir.join(format!("{video_id}_{}", random_hex8()));
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the workspace and whatever is left in it.
    /// Only called once the request succeeded: on failure it stays for diagnosis.
    pub fn discard(self, span: &Span) {
        if let Err(err) = std::fs::remove_dir_all(&self.path) {
            warn!(parent: span, "Could not delete workspace {}: {err}", self.path.display());
        }
    }
}
