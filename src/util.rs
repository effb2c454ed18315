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

use std::path::Path;
use std::time::Duration;

/// Extracts a displayable file name from a path, returning a fallback if the name is unreadable.
pub fn filename_display(path: &Path) -> &str {
    path.file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("unreadable file name")
}

/// Outputs the given duration in a seconds.milliseconds format.
pub fn duration_seconds_millis(duration: Duration) -> String {
    format!("{}.{:03}s", duration.as_secs(), duration.subsec_millis())
}

#[cfg(test)]
mod test {
    use std::{path::Path, time::Duration};

    use super::{duration_seconds_millis, filename_display};

    #[test]
    fn test_duration_seconds_millis() {
        assert_eq!("0.000s", duration_seconds_millis(Duration::ZERO));
        assert_eq!("0.150s", duration_seconds_millis(Duration::from_millis(150)));
        assert_eq!("2.800s", duration_seconds_millis(Duration::from_millis(2800)));
        assert_eq!("61.005s", duration_seconds_millis(Duration::from_millis(61_005)));
    }

    #[test]
    fn test_filename_display() {
        assert_eq!(
            "rec_20250101_120000_000.wav",
            filename_display(Path::new("recordings/rec_20250101_120000_000.wav"))
        );
        assert_eq!("unreadable file name", filename_display(Path::new("/")));
    }
}
