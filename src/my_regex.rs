use std::sync::OnceLock;

use regex::Regex;

/// Characters a video id is made of
macro_rules! id_chars {
    () => {
        r#"(?P<id>[\w-]+)"#
    };
}

/// Pattern 1: a `v` query parameter anywhere in the URL
/// Example: "https://www.youtube-nocookie.com/embed?v=dQw4w9WgXcQ"
const PATTERN1: &str = concat!(r#"v="#, id_chars!());

/// Pattern 2: a shortened-link path segment
/// Example: "youtu.be/dQw4w9WgXcQ?t=42"
const PATTERN2: &str = concat!(r#"be/"#, id_chars!());

static FALLBACK_ID_RE_LIST: OnceLock<[Regex; 2]> = OnceLock::new();

/// Patterns tried in order on URLs the host allow-list did not recognize.
/// Each has a named capture group `id`.
pub fn get_fallback_id_re_list() -> &'static [Regex] {
    FALLBACK_ID_RE_LIST.get_or_init(|| {
        [
            Regex::new(PATTERN1).expect("PATTERN1 is a valid regex"),
            Regex::new(PATTERN2).expect("PATTERN2 is a valid regex"),
        ]
    })
}
