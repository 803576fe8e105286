//! File naming rules for materialized tracks.

use std::path::{Path, PathBuf};

/// Minimum width of the ordinal prefix.
const MIN_ORDINAL_WIDTH: usize = 2;

/// Replace characters the target filesystem cannot store in a file name.
pub fn escape_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\0' => '_',
            c => c,
        })
        .collect()
}

/// Width of the zero-padded ordinal prefix for a playlist of `len` tracks.
pub fn ordinal_width(len: usize) -> usize {
    let digits = len.max(1).to_string().len();
    digits.max(MIN_ORDINAL_WIDTH)
}

/// Name a track is stored under: `"{ordinal} {name}{.ext}"`, ordinal 1-based.
///
/// The extension comes from the source file so the target keeps its format.
pub fn ordered_file_name(index: usize, len: usize, display_name: &str, source: &Path) -> String {
    let width = ordinal_width(len);
    let ext = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    format!(
        "{:0width$} {}{}",
        index + 1,
        escape_filename(display_name),
        ext,
        width = width
    )
}

/// Turn a catalog location into a local path.
///
/// Catalogs store `file://` URLs with percent-encoding; anything else that looks
/// like an absolute path is taken as-is. Remote URLs resolve to `None`.
pub fn location_to_path(location: &str) -> Option<PathBuf> {
    let trimmed = location.trim();
    if trimmed.is_empty() {
        return None;
    }
    match url::Url::parse(trimmed) {
        Ok(url) if url.scheme() == "file" => url.to_file_path().ok(),
        Ok(_) => None,
        Err(_) => {
            let path = PathBuf::from(trimmed);
            path.is_absolute().then_some(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_filename() {
        assert_eq!(escape_filename("AC/DC"), "AC_DC");
        assert_eq!(escape_filename("null\0byte"), "null_byte");
        assert_eq!(escape_filename("Plain: Name?"), "Plain: Name?");
    }

    #[test]
    fn test_ordinal_width() {
        assert_eq!(ordinal_width(0), 2);
        assert_eq!(ordinal_width(3), 2);
        assert_eq!(ordinal_width(99), 2);
        assert_eq!(ordinal_width(100), 3);
        assert_eq!(ordinal_width(1500), 4);
    }

    #[test]
    fn test_ordered_file_name() {
        let source = Path::new("/music/a.mp3");
        assert_eq!(ordered_file_name(0, 3, "A", source), "01 A.mp3");
        assert_eq!(ordered_file_name(2, 3, "C", source), "03 C.mp3");
        assert_eq!(ordered_file_name(4, 120, "E", source), "005 E.mp3");
        assert_eq!(
            ordered_file_name(0, 1, "No Ext", Path::new("/music/raw")),
            "01 No Ext"
        );
    }

    #[test]
    fn test_location_to_path_file_url() {
        let path = location_to_path("file://localhost/Users/me/Music/My%20Song.m4a");
        assert_eq!(path, Some(PathBuf::from("/Users/me/Music/My Song.m4a")));

        let path = location_to_path("file:///tmp/a.mp3");
        assert_eq!(path, Some(PathBuf::from("/tmp/a.mp3")));
    }

    #[test]
    fn test_location_to_path_rejects_remote() {
        assert_eq!(location_to_path("https://example.com/a.mp3"), None);
        assert_eq!(location_to_path(""), None);
        assert_eq!(location_to_path("relative/a.mp3"), None);
    }

    #[test]
    fn test_location_to_path_plain_absolute() {
        assert_eq!(
            location_to_path("/srv/music/a.flac"),
            Some(PathBuf::from("/srv/music/a.flac"))
        );
    }
}
