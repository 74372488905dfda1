use std::sync::LazyLock;

use regex::Regex;

use crate::error::Error;

static RAW_VIDEO_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap());

static VIDEO_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:youtube\.com/(?:watch\?(?:[^#]*&)?v=|shorts/|embed/|live/|v/)|youtu\.be/)([A-Za-z0-9_-]{11})(?:[?&#/]|$)",
    )
    .unwrap()
});

/// Extracts the 11 character video id from a raw id or a YouTube URL.
///
/// Accepts `watch?v=`, `youtu.be/`, `shorts/`, `embed/`, `live/` and `v/` forms,
/// with or without scheme and `www.`/`m.` prefixes.
pub fn parse_video_id(input: &str) -> Result<String, Error> {
    let input = input.trim();

    if RAW_VIDEO_ID_RE.is_match(input) {
        return Ok(input.to_string());
    }

    VIDEO_URL_RE
        .captures(input)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| Error::InvalidVideoId(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_id() {
        assert_eq!(parse_video_id("dQw4w9WgXcQ").unwrap(), "dQw4w9WgXcQ");
        assert_eq!(parse_video_id("  a_b-C1d2E3f \n").unwrap(), "a_b-C1d2E3f");
    }

    #[test]
    fn test_url_forms() {
        let cases = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=42s",
            "http://m.youtube.com/watch?v=dQw4w9WgXcQ",
            "youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?t=10",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ?autoplay=1",
            "https://www.youtube.com/live/dQw4w9WgXcQ",
        ];

        for case in cases {
            assert_eq!(
                parse_video_id(case).unwrap(),
                "dQw4w9WgXcQ",
                "failed to parse {case}"
            );
        }
    }

    #[test]
    fn test_rejects_invalid_input() {
        for case in [
            "",
            "short",
            "dQw4w9WgXcQtoolong",
            "https://example.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQextra",
            "https://www.youtube.com/@SomeChannel/streams",
        ] {
            assert!(
                matches!(parse_video_id(case), Err(Error::InvalidVideoId(_))),
                "should reject {case:?}"
            );
        }
    }
}
