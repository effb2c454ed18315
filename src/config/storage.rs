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
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Where clips and the fixed prompts live. Relative paths are relative to the config file.
#[derive(Deserialize, Clone)]
pub struct Storage {
    /// The directory recordings are written to.
    recordings: PathBuf,
    /// The prompt played to invite recordings.
    prompt: PathBuf,
    /// The prompt played between replays of a fresh recording. Defaults to the prompt.
    confirm_prompt: Option<PathBuf>,
    /// A cue played once before a fresh recording is replayed.
    cue: Option<PathBuf>,
}

impl Storage {
    pub fn recordings(&self, base: &Path) -> PathBuf {
        base.join(&self.recordings)
    }

    pub fn prompt(&self, base: &Path) -> PathBuf {
        base.join(&self.prompt)
    }

    pub fn confirm_prompt(&self, base: &Path) -> PathBuf {
        base.join(self.confirm_prompt.as_ref().unwrap_or(&self.prompt))
    }

    pub fn cue(&self, base: &Path) -> Option<PathBuf> {
        self.cue.as_ref().map(|cue| base.join(cue))
    }
}
