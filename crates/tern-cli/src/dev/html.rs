//! Reload-client injection for served HTML documents.

use std::borrow::Cow;

/// Insert the live-reload listener right after the document's `<head>` tag.
///
/// The tag is matched case-insensitively, with or without attributes.
/// When `watch` is off, or the document has no `<head>`, the input is
/// returned unchanged.
pub fn inject_reload_client(html: &str, watch: bool, reload_port: u16) -> Cow<'_, str> {
    if !watch {
        return Cow::Borrowed(html);
    }

    let Some(insert_at) = head_tag_end(html) else {
        return Cow::Borrowed(html);
    };

    let script = reload_script(reload_port);
    let mut result = String::with_capacity(html.len() + script.len());
    result.push_str(&html[..insert_at]);
    result.push_str(&script);
    result.push_str(&html[insert_at..]);
    Cow::Owned(result)
}

/// The `<script>` block that reloads the page on any message from the
/// reload listener.
pub fn reload_script(reload_port: u16) -> String {
    format!(
        "\n<script>\n  (function () {{\n    var socket = new WebSocket('ws://' + window.location.hostname + ':{}');\n    socket.addEventListener('message', function () {{\n      window.location.reload();\n    }});\n  }})();\n</script>\n",
        reload_port
    )
}

/// Byte offset just past the `>` of the first `<head>` opening tag.
fn head_tag_end(html: &str) -> Option<usize> {
    let bytes = html.as_bytes();
    let mut from = 0;

    while let Some(offset) = find_ascii_ci(&bytes[from..], b"<head") {
        let start = from + offset;
        let after_name = start + "<head".len();
        match bytes.get(after_name) {
            Some(b'>') => return Some(after_name + 1),
            Some(c) if c.is_ascii_whitespace() || *c == b'/' => {
                let close = bytes[after_name..].iter().position(|b| *b == b'>')?;
                return Some(after_name + close + 1);
            }
            // `<header>`, `<heading>`, ...
            _ => from = after_name,
        }
    }

    None
}

fn find_ascii_ci(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}
