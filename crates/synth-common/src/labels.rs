//! Identifier formats for synthetic subjects and sites.

pub fn subject_label(ordinal: usize) -> String {
    format!("SUBJ-{:04}", ordinal + 1)
}

pub fn site_label(index: usize) -> String {
    format!("SITE-{:02}", index + 1)
}

/// Reference arm for a configured arm: the same label, else the reference
/// arm at the same position.
pub fn reference_arm<'a>(
    configured: &str,
    arm_index: usize,
    reference_arms: &'a [String],
) -> Option<&'a str> {
    reference_arms
        .iter()
        .find(|arm| arm.as_str() == configured)
        .or_else(|| reference_arms.get(arm_index))
        .map(String::as_str)
}
