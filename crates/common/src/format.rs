//! Text-formatting boundary.
//!
//! Rich markup rendering is an external collaborator (spec §1); the engine
//! only needs to normalize inbound HTML fragments (from remote activities)
//! and local plain-text posts down to the `content` it stores.

/// Normalizes post content into the plain form the engine persists.
pub trait TextFormatter: Send + Sync {
    /// Strip markup from `input`, collapsing it to plain text suitable for
    /// storage and hashtag/FTS indexing.
    fn to_plain(&self, input: &str) -> String;
}

/// Minimal HTML-stripping [`TextFormatter`]: drops tags, decodes the handful
/// of entities remote servers commonly send, collapses whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicTextFormatter;

impl TextFormatter for BasicTextFormatter {
    fn to_plain(&self, input: &str) -> String {
        strip_html_basic(input)
    }
}

/// Strip HTML tags and decode common entities, collapsing runs of
/// whitespace produced by block-level tags into single spaces/newlines.
#[must_use]
pub fn strip_html_basic(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if in_tag => {}
            '&' => {
                let mut entity = String::new();
                while let Some(&next) = chars.peek() {
                    if next == ';' || entity.len() > 8 {
                        break;
                    }
                    entity.push(next);
                    chars.next();
                }
                if chars.peek() == Some(&';') {
                    chars.next();
                    out.push_str(match entity.as_str() {
                        "amp" => "&",
                        "lt" => "<",
                        "gt" => ">",
                        "quot" => "\"",
                        "apos" => "'",
                        "nbsp" => " ",
                        _ => {
                            out.push('&');
                            out.push_str(&entity);
                            out.push(';');
                            continue;
                        }
                    });
                } else {
                    out.push('&');
                    out.push_str(&entity);
                }
            }
            _ => out.push(c),
        }
    }

    let collapsed: String = out.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags() {
        assert_eq!(strip_html_basic("<p>hello <b>world</b></p>"), "hello world");
    }

    #[test]
    fn decodes_common_entities() {
        assert_eq!(strip_html_basic("a &amp; b &lt;3"), "a & b <3");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(strip_html_basic("a\n\n  b   c"), "a b c");
    }
}
