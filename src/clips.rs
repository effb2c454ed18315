// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use parking_lot::{Mutex, MutexGuard};
use tracing::{error, info, span, warn, Level, Span};

use crate::{error::Error, util::filename_display};

/// The extension of stored clips.
const CLIP_EXTENSION: &str = "wav";

/// The prefix of generated clip names.
const CLIP_PREFIX: &str = "rec_";

/// The timestamp format of generated clip names. Lexicographic order is chronological order.
const CLIP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// The subdirectory holding recordings that haven't been confirmed yet. It's never scanned
/// for playable clips.
const PENDING_DIR: &str = "pending";

/// A stored recording.
#[derive(Debug, PartialEq, Eq)]
pub struct Clip {
    path: PathBuf,
    created_at: DateTime<Local>,
}

impl Clip {
    /// Creates a clip.
    pub fn new(path: PathBuf, created_at: DateTime<Local>) -> Clip {
        Clip { path, created_at }
    }

    /// Creates a clip for an existing file, taking the creation time from its name when it
    /// was generated by this installation and from the file's metadata otherwise.
    pub fn from_file(path: PathBuf) -> Clip {
        let created_at = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.strip_prefix(CLIP_PREFIX))
            .and_then(|stamp| NaiveDateTime::parse_from_str(stamp, CLIP_TIMESTAMP_FORMAT).ok())
            .and_then(|naive| Local.from_local_datetime(&naive).earliest())
            .or_else(|| {
                fs::metadata(&path)
                    .and_then(|metadata| metadata.modified())
                    .ok()
                    .map(DateTime::<Local>::from)
            })
            .unwrap_or_else(Local::now);
        Clip { path, created_at }
    }

    /// Returns the path for a clip created at the given time in the given directory.
    pub fn path_for(dir: &Path, created_at: &DateTime<Local>) -> PathBuf {
        dir.join(format!(
            "{}{}.{}",
            CLIP_PREFIX,
            created_at.format(CLIP_TIMESTAMP_FORMAT),
            CLIP_EXTENSION
        ))
    }

    /// The clip's file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When the clip was recorded.
    pub fn created_at(&self) -> &DateTime<Local> {
        &self.created_at
    }

    /// The clip's display name.
    pub fn name(&self) -> &str {
        filename_display(&self.path)
    }
}

impl fmt::Display for Clip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (recorded {})",
            self.name(),
            self.created_at.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// What the playback cursor is doing.
#[derive(Clone, Debug, PartialEq)]
pub enum Mode {
    /// Looping over the stored clips.
    Loop,
    /// Alternating between an unconfirmed candidate and the prompt.
    Confirmation(Arc<Clip>),
}

/// The playback position within the sequence.
#[derive(Debug)]
pub struct Cursor {
    index: usize,
    mode: Mode,
    skip_pending: bool,
}

/// The ordered clips and the playback cursor. Both are only ever touched while holding
/// the store's lock, which keeps `index < clips.len()` whenever there are clips.
#[derive(Debug)]
pub struct Sequence {
    clips: Vec<Arc<Clip>>,
    cursor: Cursor,
}

impl Sequence {
    fn new(clips: Vec<Arc<Clip>>) -> Sequence {
        Sequence {
            clips,
            cursor: Cursor {
                index: 0,
                mode: Mode::Loop,
                skip_pending: false,
            },
        }
    }

    /// The cursor position.
    pub fn index(&self) -> usize {
        self.cursor.index
    }

    /// The clip under the cursor.
    pub fn current(&self) -> Option<Arc<Clip>> {
        self.clips.get(self.cursor.index).cloned()
    }

    /// The cursor mode.
    pub fn mode(&self) -> &Mode {
        &self.cursor.mode
    }

    /// Switches the cursor mode, returning the previous one.
    pub fn set_mode(&mut self, mode: Mode) -> Mode {
        std::mem::replace(&mut self.cursor.mode, mode)
    }

    /// Moves the cursor forward by one, wrapping at the end.
    pub fn advance(&mut self) {
        if self.clips.is_empty() {
            self.cursor.index = 0;
            return;
        }
        self.cursor.index = (self.cursor.index + 1) % self.clips.len();
    }

    /// Moves the cursor forward and remembers that the in-flight turn was skipped.
    pub fn skip(&mut self) {
        self.advance();
        self.cursor.skip_pending = true;
    }

    /// Forgets any pending skip. Called when a new turn begins.
    pub fn begin_turn(&mut self) {
        self.cursor.skip_pending = false;
    }

    /// Ends the in-flight turn. A skipped turn already moved the cursor, so only the skip
    /// flag is cleared; otherwise the cursor advances if the turn completed. Returns true
    /// if the turn counts as played.
    pub fn finish_turn(&mut self, completed: bool, from_store: bool) -> bool {
        if self.cursor.skip_pending {
            self.cursor.skip_pending = false;
            return true;
        }
        if completed && from_store {
            self.advance();
        }
        completed
    }

    fn insert(&mut self, position: usize, clip: Arc<Clip>) -> usize {
        let position = position.min(self.clips.len());
        if !self.clips.is_empty() && position <= self.cursor.index {
            self.cursor.index += 1;
        }
        self.clips.insert(position, clip);
        position
    }

    fn remove(&mut self, path: &Path) -> Option<Arc<Clip>> {
        let position = self.clips.iter().position(|clip| clip.path() == path)?;
        let clip = self.clips.remove(position);
        if position < self.cursor.index {
            self.cursor.index -= 1;
        }
        if self.cursor.index >= self.clips.len() {
            self.cursor.index = 0;
        }
        Some(clip)
    }
}

/// The outcome of a reset.
#[derive(Debug, Default)]
pub struct ResetReport {
    /// The files that were deleted.
    pub deleted: Vec<PathBuf>,
    /// The files that couldn't be deleted.
    pub failures: Vec<Error>,
}

/// Owns the recordings directory and the ordered sequence of confirmed clips. Unconfirmed
/// recordings live in a pending subdirectory until they're admitted.
pub struct ClipStore {
    dir: PathBuf,
    sequence: Mutex<Sequence>,
    span: Span,
}

impl ClipStore {
    /// Opens the store at the given directory, creating it if needed, and loads the clips
    /// already in it. Failing to create the directory is the one unrecoverable error.
    pub fn load(dir: &Path) -> Result<ClipStore, Error> {
        let span = span!(Level::INFO, "clips");
        let _enter = span.enter();

        let pending = dir.join(PENDING_DIR);
        fs::create_dir_all(&pending).map_err(|e| Error::filesystem(&pending, e))?;

        let clips: Vec<Arc<Clip>> = Self::scan(dir)?
            .into_iter()
            .map(|path| Arc::new(Clip::from_file(path)))
            .collect();
        info!(dir = %dir.display(), count = clips.len(), "Loaded existing clips.");

        drop(_enter);
        Ok(ClipStore {
            dir: dir.to_path_buf(),
            sequence: Mutex::new(Sequence::new(clips)),
            span,
        })
    }

    /// Returns the clip files in the directory, sorted by name.
    fn scan(dir: &Path) -> Result<Vec<PathBuf>, Error> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| Error::filesystem(dir, e))? {
            let path = entry.map_err(|e| Error::filesystem(dir, e))?.path();
            let is_clip = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(CLIP_EXTENSION));
            if is_clip && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// The recordings directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where recordings wait for confirmation.
    pub fn pending_dir(&self) -> PathBuf {
        self.dir.join(PENDING_DIR)
    }

    /// Moves a confirmed recording out of the pending directory and returns it as a stored
    /// clip. The clip isn't part of the sequence until it's inserted.
    pub fn admit(&self, candidate: &Clip) -> Result<Arc<Clip>, Error> {
        let _enter = self.span.enter();
        let name = candidate
            .path()
            .file_name()
            .ok_or_else(|| Error::MissingClip(candidate.path().to_path_buf()))?;
        let target = self.dir.join(name);
        fs::rename(candidate.path(), &target).map_err(|e| Error::filesystem(candidate.path(), e))?;
        info!(clip = candidate.name(), "Admitted clip.");
        Ok(Arc::new(Clip::new(target, *candidate.created_at())))
    }

    /// Deletes recordings left pending by an earlier run that never confirmed them.
    /// Returns how many were deleted.
    pub fn purge_pending(&self) -> usize {
        let _enter = self.span.enter();
        let pending = self.pending_dir();
        let paths = match Self::scan(&pending) {
            Ok(paths) => paths,
            Err(e) => {
                warn!(err = e.to_string(), "Unable to scan pending recordings.");
                return 0;
            }
        };

        let mut purged = 0;
        for path in paths {
            match fs::remove_file(&path) {
                Ok(()) => purged += 1,
                Err(e) => warn!(
                    path = %path.display(),
                    err = e.to_string(),
                    "Unable to delete pending recording."
                ),
            }
        }
        if purged > 0 {
            info!(purged, "Deleted unconfirmed recordings.");
        }
        purged
    }

    /// Locks the sequence. Hold the guard only for short, non-blocking work.
    pub fn lock(&self) -> MutexGuard<'_, Sequence> {
        self.sequence.lock()
    }

    /// Returns the clips in playback order.
    pub fn list(&self) -> Vec<Arc<Clip>> {
        self.lock().clips.clone()
    }

    /// The number of confirmed clips.
    pub fn len(&self) -> usize {
        self.lock().clips.len()
    }

    /// True when there are no confirmed clips.
    pub fn is_empty(&self) -> bool {
        self.lock().clips.is_empty()
    }

    /// Inserts a clip immediately after the given position. Returns where it landed.
    pub fn insert_after(&self, index: usize, clip: Arc<Clip>) -> usize {
        let _enter = self.span.enter();
        let mut sequence = self.lock();
        let position = if sequence.clips.is_empty() {
            0
        } else {
            index.saturating_add(1)
        };
        let position = sequence.insert(position, clip.clone());
        info!(clip = clip.name(), position, "Inserted clip.");
        position
    }

    /// Inserts a clip immediately after the cursor so that it plays next. Returns where
    /// it landed, which is `(cursor + 1) mod (len + 1)`.
    pub fn insert_next(&self, clip: Arc<Clip>) -> usize {
        let _enter = self.span.enter();
        let mut sequence = self.lock();
        let position = if sequence.clips.is_empty() {
            0
        } else {
            sequence.cursor.index + 1
        };
        let position = sequence.insert(position, clip.clone());
        info!(clip = clip.name(), position, "Inserted clip after the cursor.");
        position
    }

    /// Removes a clip from the sequence and deletes its file.
    pub fn remove(&self, path: &Path) -> Result<Option<Arc<Clip>>, Error> {
        let _enter = self.span.enter();
        let removed = self.lock().remove(path);
        if let Some(clip) = removed.as_ref() {
            info!(clip = clip.name(), "Removed clip.");
            match fs::remove_file(clip.path()) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::filesystem(clip.path(), e)),
            }
        }
        Ok(removed)
    }

    /// Deletes every clip file in the directory, pending ones included, and clears the
    /// sequence. A file that can't be deleted is reported without stopping the rest of
    /// the reset.
    pub fn reset(&self) -> ResetReport {
        self.reset_with(|path| fs::remove_file(path))
    }

    fn reset_with<F>(&self, remove: F) -> ResetReport
    where
        F: Fn(&Path) -> io::Result<()>,
    {
        let _enter = self.span.enter();
        let mut report = ResetReport::default();

        {
            let mut sequence = self.lock();
            sequence.clips.clear();
            sequence.cursor.index = 0;
        }
        info!("Cleared the clip sequence.");

        let mut paths = Vec::new();
        for dir in [self.dir.clone(), self.pending_dir()] {
            match Self::scan(&dir) {
                Ok(found) => paths.extend(found),
                Err(e) => {
                    error!(err = e.to_string(), "Unable to scan recordings.");
                    report.failures.push(e);
                }
            }
        }

        for path in paths {
            match remove(&path) {
                Ok(()) => report.deleted.push(path),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    let e = Error::filesystem(path, e);
                    warn!(err = e.to_string(), "Unable to delete clip.");
                    report.failures.push(e);
                }
            }
        }

        info!(
            deleted = report.deleted.len(),
            failures = report.failures.len(),
            "Reset recordings."
        );
        report
    }
}
