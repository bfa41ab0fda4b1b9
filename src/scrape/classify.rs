//! Extension-based media classification.

use std::path::Path;

use serde::Serialize;
use url::Url;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "ogg", "mov", "avi", "mkv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            Some(Self::Image)
        } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
            Some(Self::Video)
        } else {
            None
        }
    }
}

/// Classify a URL by the extension of its last path segment.
///
/// The query string and fragment never take part, so `pic.svg?x=1` is an image.
pub fn classify(url: &Url) -> Option<MediaKind> {
    let segment = url.path().rsplit('/').next()?;
    let (stem, extension) = segment.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    MediaKind::from_extension(extension)
}

pub fn is_media_url(url: &Url) -> bool {
    classify(url).is_some()
}

/// Same allow-list, applied to a file on disk
pub fn classify_path(path: &Path) -> Option<MediaKind> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(MediaKind::from_extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_recognised_extensions() {
        assert!(is_media_url(&url("https://example.com/photos/CAT.JPG")));
        assert!(is_media_url(&url("https://example.com/clip.mp4")));
        assert!(is_media_url(&url("https://example.com/logo.svg?x=1")));
        assert!(is_media_url(&url("https://example.com/a/b/movie.MkV#t=10")));
    }

    #[test]
    fn test_rejected_urls() {
        assert!(!is_media_url(&url("https://example.com/readme.txt")));
        assert!(!is_media_url(&url("https://example.com/paper.pdf")));
        assert!(!is_media_url(&url("https://example.com/images/cat")));
        assert!(!is_media_url(&url("https://example.com/")));
        assert!(!is_media_url(&url("https://example.com/.png")));
        // the extension must belong to the last segment, not a directory
        assert!(!is_media_url(&url("https://example.com/pics.png/view")));
        assert!(!is_media_url(&url("https://example.com/view?file=cat.png")));
    }

    #[test]
    fn test_kind() {
        assert_eq!(
            classify(&url("https://example.com/a.webp")),
            Some(MediaKind::Image)
        );
        assert_eq!(
            classify(&url("https://example.com/a.ogg")),
            Some(MediaKind::Video)
        );
        assert_eq!(
            classify_path(Path::new("/tmp/files/b.MOV")),
            Some(MediaKind::Video)
        );
        assert_eq!(classify_path(Path::new("notes.md")), None);
    }
}
