use anyhow::{Context, Result};
use regex::Regex;

use super::text::condense_whitespace;

pub const UNKNOWN_LABEL: &str = "Desconocido";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CleaningProfile {
    /// Subheading flows: drop customs boilerplate and re-case the label.
    Aggressive,
    /// End-use flows: drop parentheticals only, keep the source casing.
    Light,
}

pub struct DescriptionCleaner {
    boilerplate_prefix: Regex,
    parenthetical: Regex,
}

impl DescriptionCleaner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            boilerplate_prefix: Regex::new(
                r"^(?:LOS\s+DEM[ÁA]S|LAS\s+DEM[ÁA]S|OTROS|OTRAS)\b[\s:,;.\-]*",
            )
            .context("failed to compile boilerplate prefix regex")?,
            parenthetical: Regex::new(r"\([^)]*\)?")
                .context("failed to compile parenthetical regex")?,
        })
    }

    pub fn clean(&self, raw: &str, profile: CleaningProfile) -> String {
        let cleaned = match profile {
            CleaningProfile::Aggressive => self.clean_aggressive(raw),
            CleaningProfile::Light => self.strip_parentheticals(raw),
        };

        if cleaned.is_empty() {
            UNKNOWN_LABEL.to_string()
        } else {
            cleaned
        }
    }

    fn clean_aggressive(&self, raw: &str) -> String {
        let mut text = raw.trim().to_uppercase();
        while let Some(found) = self.boilerplate_prefix.find(&text) {
            if found.as_str().is_empty() {
                break;
            }
            text = text[found.end()..].trim_start().to_string();
        }

        sentence_case(&self.strip_parentheticals(&text))
    }

    fn strip_parentheticals(&self, text: &str) -> String {
        let stripped = self.parenthetical.replace_all(text, " ");
        condense_whitespace(&stripped)
            .trim_matches(|c: char| c == ',' || c == ';' || c == ':' || c == '-')
            .trim()
            .to_string()
    }
}

fn sentence_case(text: &str) -> String {
    let lower = text.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
