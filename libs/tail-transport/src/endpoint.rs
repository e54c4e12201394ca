use percent_encoding::percent_decode_str;
use tail_api::Cursor;
use url::Url;

use crate::settings::TransportError;

/// URL layout of a tail endpoint: `<base><path>/<topic>/<offset>/<count>[/1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailEndpoint {
    base: Url,
    /// Path segments of the endpoint below the base, e.g. `cgi-bin`, `tail.cgi`.
    path: Vec<String>,
    /// Append the `/1` compatibility flag (double-encoded payloads).
    compat_flag: bool,
}

impl TailEndpoint {
    pub fn new(base_url: &str, path: &str, compat_flag: bool) -> Result<Self, TransportError> {
        let base = Url::parse(base_url).map_err(|e| TransportError::BaseUrl {
            url: base_url.to_string(),
            detail: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(TransportError::BaseUrl {
                url: base_url.to_string(),
                detail: "not a hierarchical URL".into(),
            });
        }
        let path = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Ok(Self {
            base,
            path,
            compat_flag,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn compat_flag(&self) -> bool {
        self.compat_flag
    }

    /// Request URL for a cursor.
    pub fn url_for(&self, cursor: &Cursor) -> String {
        let mut url = self.base.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            segments.extend(self.path.iter().map(String::as_str));
            segments.push(cursor.topic());
            segments.push(&cursor.offset().to_string());
            segments.push(&cursor.count().to_string());
            if self.compat_flag {
                segments.push("1");
            }
        }
        url.into()
    }

    /// Offset encoded in a continuation URL for the same topic and count.
    /// Anything that does not match the layout yields `None`.
    pub fn offset_of(&self, url: &str, cursor: &Cursor) -> Option<i64> {
        let url = self.base.join(url).ok()?;
        let mut segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
        if self.compat_flag && segments.last() == Some(&"1") {
            segments.pop();
        }
        let [.., topic, offset, count] = segments.as_slice() else {
            return None;
        };
        let topic = percent_decode_str(topic).decode_utf8_lossy();
        if topic != cursor.topic() || count.parse::<usize>().ok()? != cursor.count() {
            return None;
        }
        offset.parse().ok()
    }

    /// Resolve a server-supplied continuation against the base URL and
    /// force the base scheme.
    pub fn rebase(&self, next: &str) -> String {
        rebase_url(&self.base, next)
    }
}

/// The service may advertise `http://` behind a TLS terminator, so the
/// scheme always follows the configured base.
pub fn rebase_url(base: &Url, next: &str) -> String {
    match base.join(next) {
        Ok(mut url) => {
            if url.scheme() != base.scheme() && url.set_scheme(base.scheme()).is_err() {
                tracing::debug!(next, "cannot rewrite continuation scheme");
            }
            url.into()
        }
        Err(e) => {
            tracing::debug!(next, error = %e, "continuation is not a URL, using it verbatim");
            next.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(offset: i64) -> Cursor {
        Cursor::new("logs", offset, 100).unwrap()
    }

    #[test]
    fn builds_cursor_urls() {
        let ep = TailEndpoint::new("http://h:8080/", "/cgi-bin/tail.cgi", false).unwrap();
        assert_eq!(ep.url_for(&cursor(-1)), "http://h:8080/cgi-bin/tail.cgi/logs/-1/100");

        let ep = TailEndpoint::new("https://h/app", "cgi-bin/tail.cgi", true).unwrap();
        assert_eq!(ep.url_for(&cursor(7)), "https://h/app/cgi-bin/tail.cgi/logs/7/100/1");

        let odd = Cursor::new("a b", 0, 1).unwrap();
        assert_eq!(ep.url_for(&odd), "https://h/app/cgi-bin/tail.cgi/a%20b/0/1/1");
    }

    #[test]
    fn rejects_non_base_urls() {
        assert!(TailEndpoint::new("mailto:x@y", "/t", false).is_err());
        assert!(TailEndpoint::new("not a url", "/t", false).is_err());
    }

    #[test]
    fn reads_offset_from_continuation() {
        let ep = TailEndpoint::new("http://h/", "/cgi-bin/tail.cgi", true).unwrap();
        let c = cursor(0);
        assert_eq!(ep.offset_of("http://h/cgi-bin/tail.cgi/logs/42/100/1", &c), Some(42));
        assert_eq!(ep.offset_of("/cgi-bin/tail.cgi/logs/43/100", &c), Some(43));
        assert_eq!(ep.offset_of("/cgi-bin/tail.cgi/other/43/100", &c), None);
        assert_eq!(ep.offset_of("/cgi-bin/tail.cgi/logs/43/5", &c), None);
        assert_eq!(ep.offset_of("/cgi-bin/tail.cgi/logs/x/100", &c), None);
    }

    #[test]
    fn continuation_topic_is_percent_decoded() {
        let ep = TailEndpoint::new("http://h/", "/t", false).unwrap();
        let c = Cursor::new("app log", 0, 10).unwrap();
        assert_eq!(ep.offset_of("/t/app%20log/9/10", &c), Some(9));
        assert_eq!(ep.offset_of("/t/app%2/9/10", &c), None);
    }

    #[test]
    fn rebase_follows_base_scheme() {
        let base = Url::parse("https://h/").unwrap();
        assert_eq!(rebase_url(&base, "http://h/t/logs/1/2"), "https://h/t/logs/1/2");
        assert_eq!(rebase_url(&base, "/t/logs/1/2"), "https://h/t/logs/1/2");
    }
}
