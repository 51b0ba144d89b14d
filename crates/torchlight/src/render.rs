//! Local rendering used when the highlight service has nothing for a block.
//!
//! The output is plain: the code is escaped and wrapped in the
//! same `<pre><code>` shell the service uses, so pages still render when the
//! service is down.

/// Class placed on the `<code>` element of fallback output.
pub const FALLBACK_CLASS: &str = "torchlight";

/// Escape text for inclusion in HTML.
///
/// Escapes the five characters that are significant in element content and
/// attribute values. Other characters, including non-ASCII ones, are left
/// as-is rather than turned into named entities; the output is UTF-8 HTML.
pub fn html_escape(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#039;"),
            _ => result.push(c),
        }
    }
    result
}

/// Fallback inner HTML: the escaped source.
pub fn fallback_highlighted(code: &str) -> String {
    html_escape(code)
}

/// Fallback outer HTML wrapping [`fallback_highlighted`].
pub fn fallback_wrapped(code: &str) -> String {
    wrap(&fallback_highlighted(code))
}

fn wrap(highlighted: &str) -> String {
    format!("<pre><code class='{FALLBACK_CLASS}'>{highlighted}</code></pre>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            html_escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#039;Jerry&#039;&lt;/a&gt;"
        );
    }

    #[test]
    fn leaves_plain_text_alone() {
        assert_eq!(html_escape("fn main() {}"), "fn main() {}");
        assert_eq!(html_escape(""), "");
    }

    #[test]
    fn keeps_non_ascii_as_utf8() {
        assert_eq!(html_escape("café <ü> → ©"), "café &lt;ü&gt; → ©");
    }

    #[test]
    fn fallback_wraps_escaped_code() {
        assert_eq!(
            fallback_wrapped("echo \"hi\";"),
            "<pre><code class='torchlight'>echo &quot;hi&quot;;</code></pre>"
        );
        assert_eq!(fallback_highlighted("a < b"), "a &lt; b");
    }
}
