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
use std::{error::Error, path::Path, time::Duration};

use crate::score::SystemLocation;

/// Extracts a displayable file name from a path, returning a fallback if the name is unreadable.
pub fn filename_display(path: &Path) -> &str {
    path.file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("unreadable file name")
}

/// Outputs the given duration in a minutes:seconds format.
pub fn duration_minutes_seconds(duration: Duration) -> String {
    let minutes = duration.as_secs() / 60;
    let secs = duration.as_secs() - minutes * 60;
    format!("{}:{:02}", minutes, secs)
}

/// Parses a location written as <SYSTEM>:<POSITION>, or just <SYSTEM>.
pub fn parse_location(location: &str) -> Result<SystemLocation, Box<dyn Error>> {
    let (system, position) = match location.split_once(':') {
        Some((system, position)) => (system, position),
        None => (location, "0"),
    };

    Ok(SystemLocation::new(
        system
            .trim()
            .parse()
            .map_err(|e| format!("invalid system in location {}: {}", location, e))?,
        position
            .trim()
            .parse()
            .map_err(|e| format!("invalid position in location {}: {}", location, e))?,
    ))
}

#[cfg(test)]
mod test {
    use std::{path::Path, time::Duration};

    use crate::score::SystemLocation;

    use super::{duration_minutes_seconds, filename_display, parse_location};

    #[test]
    fn test_duration_minutes_strings() {
        assert_eq!("0:00", duration_minutes_seconds(Duration::ZERO));
        assert_eq!("0:02", duration_minutes_seconds(Duration::from_millis(2750)));
        assert_eq!("1:00", duration_minutes_seconds(Duration::from_secs(60)));
        assert_eq!("60:06", duration_minutes_seconds(Duration::from_secs(3606)));
    }

    #[test]
    fn test_filename_display() {
        assert_eq!("song.yaml", filename_display(Path::new("/scores/song.yaml")));
        assert_eq!("unreadable file name", filename_display(Path::new("/")));
    }

    #[test]
    fn test_parse_location() {
        assert_eq!(SystemLocation::new(2, 5), parse_location("2:5").unwrap());
        assert_eq!(SystemLocation::new(3, 0), parse_location("3").unwrap());
        assert_eq!(SystemLocation::new(1, 4), parse_location(" 1 : 4 ").unwrap());
        assert!(parse_location("a:1").is_err());
        assert!(parse_location("1:-2").is_err());
    }
}
