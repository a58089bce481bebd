//! Placeholder substitution inside XML text runs.
//!
//! The master template marks field positions two ways: bracket anchors
//! (`«subject_name»`) and, in a few fixed locations, plain literal
//! strings. Both are resolved here against run content only (`<w:t>`
//! text), so every formatting attribute around the run survives.
//!
//! All anchor patterns are combined into a single alternation applied in
//! one pass per run, so an already-substituted value is never rescanned
//! for anchors. Literal alternatives are ordered longest-first: an anchor
//! that is a prefix of another must never match short.

use std::collections::HashMap;

use regex::Regex;
use tracing::debug;

use crate::bidi::shape_to_run_xml;
use crate::conventions::TemplateConventions;
use crate::model::LetterForm;

/// The compiled substitution set for one export.
pub struct ReplacementSet {
    pattern: Regex,
    /// Bracket key → run XML.
    bracket_values: HashMap<String, String>,
    /// Literal spelling → run XML.
    literal_values: HashMap<String, String>,
}

impl ReplacementSet {
    /// Builds the set from the form's text fields: one bracket entry per
    /// field and one literal entry per alternative spelling. Bare bracket
    /// keys are resolved separately in [`apply`](Self::apply), only when a
    /// key fills a run on its own (the template sometimes splits `«`,
    /// `key`, `»` across three runs); keys are ordinary Latin words, so
    /// matching them as substrings would corrupt unrelated text.
    pub fn from_form(form: &LetterForm, conventions: &TemplateConventions) -> Self {
        let mut bracket_values = HashMap::new();
        let mut literal_values = HashMap::new();

        for (name, value) in form.fields() {
            let anchor = conventions.field_anchors.get(name);
            let run_xml = shape_to_run_xml(value);
            bracket_values.insert(anchor.bracket.clone(), run_xml.clone());
            if let Some(literal) = &anchor.literal {
                literal_values.insert(literal.clone(), run_xml);
            }
        }

        let pattern = build_pattern(
            bracket_values.keys().map(String::as_str),
            literal_values.keys().map(String::as_str),
        );
        Self {
            pattern,
            bracket_values,
            literal_values,
        }
    }

    /// Substitutes every anchor occurring in `<w:t>` content, then scrubs
    /// bracket delimiters stranded alone in their own run.
    pub fn apply(&self, xml: &str) -> String {
        let run_re = Regex::new(r"(<w:t[^>]*>)([^<]*)(</w:t>)").expect("run pattern is static");
        let replaced = run_re.replace_all(xml, |caps: &regex::Captures<'_>| {
            let open = &caps[1];
            let content = &caps[2];
            let close = &caps[3];
            if let Some(value) = self.bracket_values.get(content.trim()) {
                // A bare key stranded alone in its run by a split
                // bracket pair.
                debug!(run = %content, "substituted stranded key run");
                return format!("{open}{value}{close}");
            }
            if !content.contains('«') && !self.pattern.is_match(content) {
                return format!("{open}{content}{close}");
            }
            let new_content = self.pattern.replace_all(content, |m: &regex::Captures<'_>| {
                if let Some(key) = m.name("key") {
                    self.bracket_values
                        .get(key.as_str())
                        .cloned()
                        .unwrap_or_default()
                } else {
                    self.literal_values
                        .get(&m[0])
                        .cloned()
                        .unwrap_or_default()
                }
            });
            debug!(run = %content, "substituted placeholder run");
            format!("{open}{new_content}{close}")
        });

        let strand_re =
            Regex::new(r"(<w:t[^>]*>)\s*[«»]+\s*(</w:t>)").expect("strand pattern is static");
        strand_re
            .replace_all(&replaced, |caps: &regex::Captures<'_>| {
                format!("{}{}", &caps[1], &caps[2])
            })
            .into_owned()
    }
}

/// One alternation over all anchors: bracket forms capture their key,
/// literal spellings match verbatim. Both branches longest-first.
fn build_pattern<'a>(
    bracket_keys: impl Iterator<Item = &'a str>,
    literals: impl Iterator<Item = &'a str>,
) -> Regex {
    let mut brackets: Vec<&str> = bracket_keys.collect();
    brackets.sort_by_key(|k| std::cmp::Reverse(k.chars().count()));
    let mut literals: Vec<&str> = literals.collect();
    literals.sort_by_key(|k| std::cmp::Reverse(k.chars().count()));

    let bracket_alt = brackets
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    let literal_alt = literals
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = if literal_alt.is_empty() {
        format!("«\\s*(?P<key>{bracket_alt})\\s*»")
    } else {
        format!("«\\s*(?P<key>{bracket_alt})\\s*»|(?:{literal_alt})")
    };
    Regex::new(&pattern).expect("anchor alternation built from escaped literals")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn set_for(form: &LetterForm) -> ReplacementSet {
        ReplacementSet::from_form(form, &TemplateConventions::default())
    }

    fn form_with_to(value: &str) -> LetterForm {
        LetterForm {
            to: value.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn bracket_anchor_is_replaced_preserving_run_attrs() {
        let set = set_for(&form_with_to("أحمد"));
        let xml = r#"<w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">«to»</w:t></w:r>"#;
        let out = set.apply(xml);
        assert!(out.contains("أحمد"));
        assert!(out.contains(r#"<w:t xml:space="preserve">"#));
        assert!(!out.contains("«to»"));
    }

    #[test]
    fn literal_spelling_is_replaced_anywhere_in_run() {
        let set = set_for(&form_with_to("شركة النور"));
        let xml = "<w:t>السادة اسم المخاطب المحترمين</w:t>";
        let out = set.apply(xml);
        assert!(out.contains("شركة النور"));
        assert!(!out.contains("اسم المخاطب"));
    }

    #[test]
    fn longest_anchor_wins_over_prefix() {
        // "subject_name" must not be consumed by a hypothetical shorter
        // anchor; the bare key and the bracket form both resolve fully.
        let mut form = LetterForm::default();
        form.subject_name = "طلب".to_string();
        form.sender = "س".to_string();
        let set = set_for(&form);
        let out = set.apply("<w:t>«subject_name»</w:t>");
        // Pure-RTL value, so no directional wrapping either.
        assert_eq!(out, "<w:t>طلب</w:t>");
    }

    #[test]
    fn split_bracket_key_is_substituted_and_delimiters_scrubbed() {
        let set = set_for(&form_with_to("أحمد"));
        let xml = "<w:r><w:t>«</w:t></w:r><w:r><w:t>to</w:t></w:r><w:r><w:t>»</w:t></w:r>";
        let out = set.apply(xml);
        assert!(out.contains("أحمد"));
        assert!(!out.contains('«'));
        assert!(!out.contains('»'));
    }

    #[test]
    fn bare_key_inside_latin_text_is_left_alone() {
        let set = set_for(&form_with_to("XX"));
        // "to" occurs mid-word; only a run holding the key alone is a
        // split bracket pair.
        let xml = "<w:t>AutoWriter App</w:t>";
        assert_eq!(set.apply(xml), xml);
    }

    #[test]
    fn whitespace_padded_bare_key_is_substituted() {
        let set = set_for(&form_with_to("أحمد"));
        let out = set.apply("<w:t xml:space=\"preserve\"> to </w:t>");
        assert!(out.contains("أحمد"));
        assert!(!out.contains("to"));
    }

    #[test]
    fn value_with_reserved_chars_is_escaped() {
        let set = set_for(&form_with_to("A&B <co>"));
        let out = set.apply("<w:t>«to»</w:t>");
        // Directional marks interleave with the value, so compare after
        // stripping them.
        let stripped = crate::bidi::strip_marks(&out);
        assert!(stripped.contains("A&amp;B"));
        assert!(stripped.contains("&lt;co&gt;"));
        assert!(!out.contains("<co>"));
    }

    #[test]
    fn substituted_value_is_not_rescanned_for_anchors() {
        let mut form = form_with_to("اسم المخاطب");
        form.sender = "غير مستخدم".to_string();
        let set = set_for(&form);
        // The value equals another anchor spelling; one pass means it
        // must survive verbatim.
        let out = set.apply("<w:t>«to»</w:t>");
        assert!(out.contains("اسم المخاطب"));
    }

    #[test]
    fn multiline_value_becomes_run_breaks() {
        let mut form = LetterForm::default();
        form.body = "سطر أول\nسطر ثان".to_string();
        let set = set_for(&form);
        let out = set.apply("<w:t>«body»</w:t>");
        assert!(out.contains("</w:t><w:br/><w:t xml:space=\"preserve\">"));
    }
}
