//! Markup neutralization for the two free-text bookmark fields.
//!
//! Mirrors the allowlist filtering the service has always applied on the
//! way out: tags outside the allowlist are entity-escaped whole (so
//! `<script>` survives only as visible text), allowed tags are rebuilt
//! with event-handler attributes and javascript: URLs dropped, and angle
//! brackets in text position become entities. `&` is never escaped, which
//! keeps the whole pass idempotent.

use crate::model::Bookmark;

const ALLOWED_TAGS: &[(&str, &[&str])] = &[
    ("a", &["href", "title", "target"]),
    ("b", &[]),
    ("blockquote", &[]),
    ("br", &[]),
    ("code", &[]),
    ("em", &[]),
    ("i", &[]),
    ("img", &["src", "alt", "title", "width", "height"]),
    ("li", &[]),
    ("ol", &[]),
    ("p", &[]),
    ("pre", &[]),
    ("strong", &[]),
    ("ul", &[]),
];

fn allowed_attrs(tag: &str) -> Option<&'static [&'static str]> {
    ALLOWED_TAGS
        .iter()
        .find(|(name, _)| *name == tag)
        .map(|(_, attrs)| *attrs)
}

/// Returns a copy of the record with `title` and `description` cleaned;
/// `id`, `url` and `rating` pass through unchanged.
pub fn sanitize_bookmark(bookmark: Bookmark) -> Bookmark {
    Bookmark {
        title: clean(&bookmark.title),
        description: clean(&bookmark.description),
        ..bookmark
    }
}

struct RawTag<'a> {
    /// Bytes consumed from the input, including both angle brackets.
    len: usize,
    /// Everything between `<` and `>`, verbatim.
    inner: &'a str,
    closing: bool,
    name: String,
    attrs: &'a str,
    self_closing: bool,
}

/// Neutralizes markup in a free-text field. Idempotent.
pub fn clean(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('<') {
        push_text(&mut out, &rest[..pos]);
        let tail = &rest[pos..];
        match parse_tag(tail) {
            Some(tag) => {
                match allowed_attrs(&tag.name) {
                    Some(attrs) if !tag.closing => emit_opening_tag(&mut out, &tag, attrs),
                    Some(_) => {
                        out.push_str("</");
                        out.push_str(&tag.name);
                        out.push('>');
                    }
                    None => {
                        // Unknown tag: escape the whole thing into text.
                        // Quoted attribute values may hold angle brackets of
                        // their own; those become text too, so escape them.
                        out.push_str("&lt;");
                        push_text(&mut out, &tag.inner.replace('<', "&lt;"));
                        out.push_str("&gt;");
                    }
                }
                rest = &tail[tag.len..];
            }
            None => {
                // A `<` that opens no well-formed tag.
                out.push_str("&lt;");
                rest = &tail[1..];
            }
        }
    }

    push_text(&mut out, rest);
    out
}

/// Emits a text segment, escaping any `>` so the output never carries a
/// raw angle bracket outside an emitted tag.
fn push_text(out: &mut String, text: &str) {
    out.push_str(&text.replace('>', "&gt;"));
}

/// Parses one tag starting at a `<`. Returns `None` unless the input holds
/// a named tag with a matching `>` (quoted attribute values may contain
/// `>` without terminating the tag).
fn parse_tag(s: &str) -> Option<RawTag<'_>> {
    let bytes = s.as_bytes();
    let mut i = 1;

    let closing = bytes.get(i) == Some(&b'/');
    if closing {
        i += 1;
    }

    let name_start = i;
    while i < bytes.len() && bytes[i].is_ascii_alphanumeric() {
        i += 1;
    }
    if i == name_start || !bytes[name_start].is_ascii_alphabetic() {
        return None;
    }
    let name = s[name_start..i].to_ascii_lowercase();
    let attrs_start = i;

    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => {
                let mut attrs = &s[attrs_start..i];
                let self_closing = attrs.trim_end().ends_with('/');
                if self_closing {
                    attrs = attrs.trim_end().strip_suffix('/').unwrap_or(attrs);
                }
                return Some(RawTag {
                    len: i + 1,
                    inner: &s[1..i],
                    closing,
                    name,
                    attrs,
                    self_closing,
                });
            }
            None => {}
        }
        i += 1;
    }

    None
}

fn emit_opening_tag(out: &mut String, tag: &RawTag<'_>, allowed: &[&str]) {
    out.push('<');
    out.push_str(&tag.name);

    for (name, value) in AttrIter::new(tag.attrs) {
        let lname = name.to_ascii_lowercase();
        if lname.starts_with("on") || !allowed.contains(&lname.as_str()) {
            continue;
        }
        if matches!(lname.as_str(), "href" | "src") {
            let unsafe_scheme = value
                .as_deref()
                .map(|v| v.trim().to_ascii_lowercase().starts_with("javascript:"))
                .unwrap_or(true);
            if unsafe_scheme {
                continue;
            }
        }
        out.push(' ');
        out.push_str(&lname);
        if let Some(value) = value {
            out.push_str("=\"");
            out.push_str(&value.replace('"', "&quot;"));
            out.push('"');
        }
    }

    if tag.self_closing {
        out.push('/');
    }
    out.push('>');
}

/// Walks `name`, `name=value`, `name="value"` and `name='value'` pairs.
struct AttrIter<'a> {
    rest: &'a str,
}

impl<'a> AttrIter<'a> {
    fn new(s: &'a str) -> Self {
        AttrIter { rest: s }
    }
}

impl<'a> Iterator for AttrIter<'a> {
    type Item = (&'a str, Option<String>);

    fn next(&mut self) -> Option<Self::Item> {
        let s = self.rest.trim_start_matches(|c: char| c.is_whitespace() || c == '/');

        if s.is_empty() {
            self.rest = s;
            return None;
        }

        let name_end = s
            .find(|c: char| c.is_whitespace() || c == '=')
            .unwrap_or(s.len());
        let name = &s[..name_end];
        let after_name = s[name_end..].trim_start();

        if let Some(rest) = after_name.strip_prefix('=') {
            let rest = rest.trim_start();
            let (value, remainder) = match rest.chars().next() {
                Some(q @ ('"' | '\'')) => {
                    let body = &rest[1..];
                    match body.find(q) {
                        Some(end) => (body[..end].to_string(), &body[end + 1..]),
                        None => (body.to_string(), ""),
                    }
                }
                _ => {
                    let end = rest
                        .find(|c: char| c.is_whitespace())
                        .unwrap_or(rest.len());
                    (rest[..end].to_string(), &rest[end..])
                }
            };
            self.rest = remainder;
            Some((name, Some(value)))
        } else {
            self.rest = after_name;
            Some((name, None))
        }
    }
}
