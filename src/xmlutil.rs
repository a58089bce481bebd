//! Write-side helpers for raw XML part text.
//!
//! Parts are rewritten as text (the read side uses `roxmltree`, which is
//! read-only), so block edits need a scanner that respects nesting: a
//! `<w:p>` containing another `<w:p>` must not be closed at the inner
//! `</w:p>`.

/// Escapes the five reserved XML characters for text content.
pub(crate) fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Finds the next opening of `tag` at or after `from`, requiring a real
/// tag-name boundary so `<w:t` does not match `<w:tbl`.
fn find_open(xml: &str, tag: &str, from: usize) -> Option<usize> {
    let needle = format!("<{tag}");
    let mut at = from;
    while let Some(i) = xml.get(at..)?.find(&needle).map(|i| i + at) {
        match xml[i + needle.len()..].chars().next() {
            Some('>') | Some('/') | Some(' ') | Some('\t') | Some('\r') | Some('\n') => {
                return Some(i)
            }
            _ => at = i + needle.len(),
        }
    }
    None
}

/// Index just past the `>` closing the tag that opens at `open_at`.
fn tag_end(xml: &str, open_at: usize) -> Option<usize> {
    xml[open_at..].find('>').map(|i| open_at + i + 1)
}

/// Full span (`start..end`) of the next `tag` element at or after `from`,
/// nesting-aware. Self-closing occurrences count as complete elements.
pub(crate) fn find_block(xml: &str, tag: &str, from: usize) -> Option<(usize, usize)> {
    let close = format!("</{tag}>");
    let start = find_open(xml, tag, from)?;
    let mut cursor = tag_end(xml, start)?;
    if xml[..cursor].ends_with("/>") {
        return Some((start, cursor));
    }
    let mut depth = 1usize;
    loop {
        let next_open = find_open(xml, tag, cursor);
        let next_close = xml[cursor..].find(&close).map(|i| i + cursor);
        match (next_open, next_close) {
            (Some(o), Some(c)) if o < c => {
                let oe = tag_end(xml, o)?;
                if !xml[..oe].ends_with("/>") {
                    depth += 1;
                }
                cursor = oe;
            }
            (_, Some(c)) => {
                depth -= 1;
                cursor = c + close.len();
                if depth == 0 {
                    return Some((start, cursor));
                }
            }
            _ => return None,
        }
    }
}

/// Span of the `tag` element containing byte index `idx`, if any.
pub(crate) fn enclosing_block(xml: &str, tag: &str, idx: usize) -> Option<(usize, usize)> {
    let mut from = 0;
    let mut found: Option<(usize, usize)> = None;
    while let Some((s, e)) = find_block(xml, tag, from) {
        if s > idx {
            break;
        }
        if e > idx {
            // Keep descending in case of a nested occurrence.
            found = Some((s, e));
            from = tag_end(xml, s)?;
        } else {
            from = e;
        }
    }
    found
}
