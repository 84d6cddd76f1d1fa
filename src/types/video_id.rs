use std::{fmt::Display, ops::Deref};

use url::Url;

use crate::my_regex::get_fallback_id_re_list;

/// Hosts serving the `watch?v=<id>` form
const WATCH_HOSTS: [&str; 4] = [
    "www.youtube.com",
    "youtube.com",
    "m.youtube.com",
    "music.youtube.com",
];

/// Hosts serving the shortened `/<id>` form
const SHORT_HOSTS: [&str; 2] = ["youtu.be", "www.youtu.be"];

/// Opaque identifier of a video on its hosting site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoId(String);

impl VideoId {
    /// Extract the video identifier from a URL.
    ///
    /// Known hosts are compared exactly against an allow-list. Any other URL
    /// shape goes through the fallback patterns.
    pub fn resolve(url: &str) -> Option<Self> {
        Self::from_known_host(url)
            .or_else(|| Self::from_fallback_patterns(url))
            .map(Self)
    }

    fn from_known_host(url: &str) -> Option<String> {
        let parsed = Url::parse(url.trim()).ok()?;
        let host = parsed.host_str()?.to_ascii_lowercase();

        if WATCH_HOSTS.contains(&host.as_str()) {
            parsed
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned())
                .filter(|v| is_id(v))
        } else if SHORT_HOSTS.contains(&host.as_str()) {
            parsed
                .path_segments()?
                .next()
                .filter(|segment| is_id(segment))
                .map(str::to_owned)
        } else {
            None
        }
    }

    fn from_fallback_patterns(url: &str) -> Option<String> {
        get_fallback_id_re_list()
            .iter()
            .find_map(|re| re.captures(url))
            .and_then(|cap| cap.name("id"))
            .map(|m| m.as_str().to_owned())
    }
}

fn is_id(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

impl Deref for VideoId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("https://www.youtube.com/watch?v=abc123", "abc123")]
    #[case("https://youtube.com/watch?feature=share&v=abc-12_3", "abc-12_3")]
    #[case("https://m.youtube.com/watch?v=abc123&t=10s", "abc123")]
    #[case("https://youtu.be/abc123", "abc123")]
    #[case("https://youtu.be/abc123?si=xyz", "abc123")]
    #[case("https://www.youtube-nocookie.com/watch?v=zz9", "zz9")]
    #[case("not even a url but be/q1w2e3", "q1w2e3")]
    fn recognized_urls(#[case] url: &str, #[case] expected: &str) {
        assert_eq!(VideoId::resolve(url).as_deref(), Some(expected));
    }

    #[rstest]
    #[case("https://example.com/page")]
    #[case("https://www.youtube.com/feed/trending")]
    #[case("")]
    fn unrelated_urls(#[case] url: &str) {
        assert_eq!(VideoId::resolve(url), None);
    }

    #[test]
    fn allow_list_is_not_a_substring_match() {
        // Host merely containing an allowed name must not take the `watch` path
        let url = "https://youtube.com.evil.example/watch";
        assert_eq!(VideoId::resolve(url), None);
    }
}
