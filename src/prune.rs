//! Conditional section pruning: the repeatable distribution-list
//! paragraph and the removable date-box shape.

use regex::Regex;
use tracing::{debug, warn};

use crate::conventions::TemplateConventions;
use crate::xmlutil::{enclosing_block, escape_xml};

/// Expands or removes the "copy to" paragraph.
///
/// The anchor paragraph is the one carrying both the distribution-list
/// sentinel and a list-numbering property. With lines present it is
/// duplicated once per line; without the numbered pattern the sentinel is
/// substituted in place with the first line only. With no lines the
/// paragraph is removed and stray sentinels are scrubbed.
pub(crate) fn apply_distribution_list(
    xml: &str,
    cc_lines: &[String],
    conventions: &TemplateConventions,
) -> String {
    let anchor = &conventions.cc_anchor;
    let Some(anchor_at) = xml.find(anchor.as_str()) else {
        if !cc_lines.is_empty() {
            warn!("distribution-list anchor not found, lines dropped");
        }
        return xml.to_string();
    };

    let numbered = enclosing_block(xml, "w:p", anchor_at)
        .filter(|(s, e)| xml[*s..*e].contains("<w:numPr>"));

    let mut out = xml.to_string();
    match (numbered, cc_lines.is_empty()) {
        (Some((start, end)), false) => {
            let template = out[start..end].to_string();
            let expanded: String = cc_lines
                .iter()
                .map(|line| template.replacen(anchor.as_str(), &escape_xml(line), 1))
                .collect();
            debug!(lines = cc_lines.len(), "expanded distribution list");
            out.replace_range(start..end, &expanded);
        }
        (Some((start, end)), true) => {
            out.replace_range(start..end, "");
            out = scrub_anchor(&out, anchor);
        }
        (None, false) => {
            // Numbered paragraph pattern missing; degrade to a plain
            // text-run substitution with the first line.
            warn!("numbered distribution-list paragraph not found, using plain substitution");
            out = out.replacen(anchor.as_str(), &escape_xml(&cc_lines[0]), 1);
        }
        (None, true) => {
            out = scrub_anchor(&out, anchor);
        }
    }
    out
}

/// Removes bare sentinel occurrences from text-run content.
fn scrub_anchor(xml: &str, anchor: &str) -> String {
    let run_re = Regex::new(r"(<w:t[^>]*>)([^<]*)(</w:t>)").expect("run pattern is static");
    run_re
        .replace_all(xml, |caps: &regex::Captures<'_>| {
            format!("{}{}{}", &caps[1], caps[2].replace(anchor, ""), &caps[3])
        })
        .into_owned()
}

/// Removes the floating date-box shape when the date is hidden. Matches
/// the shape's declared display name first, then the fixed internal id
/// (template drift), and no-ops with a warning when neither is present.
pub(crate) fn apply_date_box(
    xml: &str,
    show_date: bool,
    conventions: &TemplateConventions,
) -> String {
    if show_date {
        return xml.to_string();
    }

    let name_needle = format!(r#"name="{}""#, conventions.date_box_name);
    let id_needle = conventions.date_box_id.as_str();
    let hit = xml
        .find(&name_needle)
        .or_else(|| xml.find(id_needle));
    let Some(at) = hit else {
        warn!("date-box shape not found, nothing removed");
        return xml.to_string();
    };

    // The shape may be wrapped in compatibility markup; remove the
    // outermost block that carries it, falling back inward.
    for tag in ["mc:AlternateContent", "w:drawing", "w:pict"] {
        if let Some((start, end)) = enclosing_block(xml, tag, at) {
            debug!(%tag, "removed date-box shape");
            let mut out = xml.to_string();
            out.replace_range(start..end, "");
            return out;
        }
    }
    warn!("date-box anchor found outside a removable shape block");
    xml.to_string()
}
