//! Bidirectional-text repair for values substituted into right-to-left
//! paragraphs.
//!
//! The renderer applies the Unicode bidi algorithm to each paragraph; a
//! raw value like `القسم 12/2024` ends up with the number and slash
//! visually reordered unless the left-to-right substrings are explicitly
//! isolated. Shaping here inserts embedding pairs and directional marks
//! so numbers, slashes and Latin tokens keep their logical order.
//!
//! Getting the wrap boundaries wrong corrupts displayed text without
//! breaking structural validity, so this module is covered directly by
//! unit tests rather than only through the pipeline.

use regex::Regex;

use crate::xmlutil::escape_xml;

pub(crate) const LRE: char = '\u{202A}';
pub(crate) const RLE: char = '\u{202B}';
pub(crate) const PDF: char = '\u{202C}';
pub(crate) const RLM: char = '\u{200F}';
pub(crate) const LRM: char = '\u{200E}';

/// Sentinel delimiting masked LTR tokens; private-use, never present in
/// form input.
const MASK: char = '\u{E000}';

/// True when `line` contains anything the renderer could reorder.
fn needs_shaping(line: &str) -> bool {
    line.chars().any(|c| c.is_ascii_alphanumeric() || c == '/') || line.contains("..")
}

/// Shapes one line (no newlines) for a right-to-left rendering context.
/// Input that is already safe is returned unchanged.
pub fn shape_line(line: &str) -> String {
    if !needs_shaping(line) {
        return line.to_string();
    }

    // Maximal LTR tokens: letters, digits and a fixed punctuation set,
    // optionally joined by single internal periods.
    let token_re = Regex::new(r"[0-9A-Za-z%#&+()-]+(?:\.[0-9A-Za-z%#&+()-]+)*")
        .expect("token pattern is static");
    let mut tokens: Vec<String> = Vec::new();
    let masked = token_re.replace_all(line, |caps: &regex::Captures<'_>| {
        let idx = tokens.len();
        tokens.push(format!("{LRE}{}{PDF}", &caps[0]));
        format!("{MASK}{idx}{MASK}")
    });

    // Slashes and period runs between RTL words get pinned with RLM on
    // both sides; a period run captures one following space with it.
    let slash_re = Regex::new(r"[/\\]").expect("slash pattern is static");
    let masked = slash_re.replace_all(&masked, |caps: &regex::Captures<'_>| {
        format!("{RLM}{}{RLM}", &caps[0])
    });
    let dots_re = Regex::new(r"\.+ ?").expect("dots pattern is static");
    let masked = dots_re.replace_all(&masked, |caps: &regex::Captures<'_>| {
        format!("{RLM}{}{RLM}", &caps[0])
    });

    let mut out = masked.into_owned();
    for (idx, token) in tokens.iter().enumerate() {
        out = out.replace(&format!("{MASK}{idx}{MASK}"), token);
    }

    // A trailing sentence period drifts left of the last word unless a
    // mark follows it.
    if out.ends_with('.') {
        out.push(RLM);
    }

    format!("{RLE}{out}{PDF}")
}

/// Shapes a multi-line value. Each line is shaped independently because
/// line breaks reset the renderer's directional context.
pub fn shape(text: &str) -> String {
    text.split('\n')
        .map(shape_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Shapes a value and renders it as `<w:t>` run content: lines are
/// escaped and rejoined with an in-run line break.
pub(crate) fn shape_to_run_xml(text: &str) -> String {
    text.split('\n')
        .map(|line| escape_xml(&shape_line(line)))
        .collect::<Vec<_>>()
        .join("</w:t><w:br/><w:t xml:space=\"preserve\">")
}

/// Strips every directional control this module inserts.
pub fn strip_marks(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(*c, LRE | RLE | PDF | RLM | LRM))
        .collect()
}
