//! Splits bot replies into plain text and link segments.

use once_cell::sync::Lazy;
use regex::Regex;
use std::process::{Command, Stdio};

use crate::error::LinkError;

/// Optional scheme, one or more dot-separated labels, optional path/query/fragment.
/// Word characters and the boundary are ASCII only, so `café.fr` is plain text.
static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i-u)\b((https?://)?([\w-]+\.)+[\w-]+(/[\w\-._~:/?#\[\]@!$&'()*+,;=%]*)?)")
        .expect("URL pattern is valid")
});

/// A piece of rendered message text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Link(Link),
}

/// A clickable link. `text` is what was written, `href` where it points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub text: String,
    pub href: String,
}

impl Link {
    /// Links open in a separate browsing context with no handle back to us
    pub const REL: &'static str = "noopener noreferrer";

    fn from_match(text: &str) -> Self {
        let href = if has_http_scheme(text) {
            text.to_string()
        } else {
            format!("https://{}", text)
        };
        Self {
            text: text.to_string(),
            href,
        }
    }

    /// Hand the link to the system browser as a detached process.
    ///
    /// Only http(s) targets are opened; nothing from the chat session is
    /// passed along besides the URL itself.
    pub fn open(&self) -> Result<(), LinkError> {
        if !has_http_scheme(&self.href) {
            return Err(LinkError::UnsupportedScheme(self.href.clone()));
        }

        let mut cmd = opener_command(&self.href);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd.spawn()?;

        tracing::info!(url = %self.href, rel = Link::REL, "Opened link");
        Ok(())
    }
}

fn has_http_scheme(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(target_os = "macos")]
fn opener_command(url: &str) -> Command {
    let mut cmd = Command::new("open");
    cmd.arg(url);
    cmd
}

#[cfg(target_os = "windows")]
fn opener_command(url: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", "start", "", url]);
    cmd
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn opener_command(url: &str) -> Command {
    let mut cmd = Command::new("xdg-open");
    cmd.arg(url);
    cmd
}

/// Split `text` into plain text and link segments, in order.
///
/// A match only becomes a link if it contains a dot and no whitespace.
/// Empty segments are dropped.
pub fn render(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut plain = String::new();
    let mut last = 0;

    for m in URL_PATTERN.find_iter(text) {
        plain.push_str(&text[last..m.start()]);
        last = m.end();

        let candidate = m.as_str();
        if candidate.contains('.') && !candidate.chars().any(char::is_whitespace) {
            if !plain.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut plain)));
            }
            segments.push(Segment::Link(Link::from_match(candidate)));
        } else {
            plain.push_str(candidate);
        }
    }

    plain.push_str(&text[last..]);
    if !plain.is_empty() {
        segments.push(Segment::Text(plain));
    }

    segments
}

/// Every link in `text`, in order of appearance
pub fn links(text: &str) -> Vec<Link> {
    render(text)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Link(link) => Some(link),
            Segment::Text(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Segment {
        Segment::Text(s.to_string())
    }

    fn link(text: &str, href: &str) -> Segment {
        Segment::Link(Link {
            text: text.to_string(),
            href: href.to_string(),
        })
    }

    #[test]
    fn test_bare_domain_gets_https_target() {
        assert_eq!(
            render("Visit example.com for info"),
            vec![
                text("Visit "),
                link("example.com", "https://example.com"),
                text(" for info"),
            ]
        );
    }

    #[test]
    fn test_no_links() {
        assert_eq!(render("no links here"), vec![text("no links here")]);
    }

    #[test]
    fn test_empty_input() {
        assert!(render("").is_empty());
    }

    #[test]
    fn test_explicit_scheme_is_kept() {
        assert_eq!(
            render("docs: http://docs.rs/regex/latest?x=1#top"),
            vec![
                text("docs: "),
                link(
                    "http://docs.rs/regex/latest?x=1#top",
                    "http://docs.rs/regex/latest?x=1#top"
                ),
            ]
        );
    }

    #[test]
    fn test_uppercase_scheme_not_doubled() {
        assert_eq!(
            render("HTTPS://Example.org"),
            vec![link("HTTPS://Example.org", "HTTPS://Example.org")]
        );
    }

    #[test]
    fn test_link_at_start_and_several_links() {
        assert_eq!(
            render("a.io and b.io/path"),
            vec![
                link("a.io", "https://a.io"),
                text(" and "),
                link("b.io/path", "https://b.io/path"),
            ]
        );
    }

    #[test]
    fn test_trailing_sentence_period_stays_plain() {
        assert_eq!(
            render("Go to rust-lang.org."),
            vec![
                text("Go to "),
                link("rust-lang.org", "https://rust-lang.org"),
                text("."),
            ]
        );
    }

    #[test]
    fn test_non_ascii_words_are_not_links() {
        assert_eq!(render("see café.fr now"), vec![text("see café.fr now")]);
        assert_eq!(
            render("übung: docs.rs/ünicode"),
            vec![text("übung: "), link("docs.rs/", "https://docs.rs/"), text("ünicode")]
        );
    }

    #[test]
    fn test_links_helper() {
        let found = links("see a.com, then https://b.com/x");
        let hrefs: Vec<_> = found.iter().map(|l| l.href.as_str()).collect();
        assert_eq!(hrefs, vec!["https://a.com", "https://b.com/x"]);
    }

    #[test]
    fn test_open_rejects_other_schemes() {
        let link = Link {
            text: "x".to_string(),
            href: "javascript:alert(1)".to_string(),
        };
        assert!(matches!(link.open(), Err(LinkError::UnsupportedScheme(_))));
    }
}
