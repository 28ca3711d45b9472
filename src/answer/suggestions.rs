use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::knowledge::Document;

/// Maps document category tags to a follow-up link shown under an answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionRule {
    pub matches: Vec<String>,
    pub label: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub label: String,
    pub link: String,
}

impl SuggestionRule {
    fn new(matches: &[&str], label: &str, link: &str) -> Self {
        Self {
            matches: matches.iter().map(|tag| (*tag).to_string()).collect(),
            label: label.to_string(),
            link: link.to_string(),
        }
    }

    /// Rules used when the configuration declares none
    #[inline]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(
                &["menu", "cakes", "pastries", "breads", "cookies"],
                "View Menu",
                "/menu/",
            ),
            Self::new(&["orders"], "My Orders", "/orders/"),
            Self::new(&["payments"], "Payment Help", "/payment/"),
            Self::new(&["contact", "hours", "store"], "Contact Us", "/contact/"),
            Self::new(&["delivery"], "Delivery Info", "/about/"),
        ]
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.label.trim().is_empty()
            || self.link.trim().is_empty()
            || self.matches.is_empty()
            || self.matches.iter().any(|tag| tag.trim().is_empty())
        {
            return Err(ConfigError::InvalidSuggestionRule(self.label.clone()));
        }
        Ok(())
    }

    #[inline]
    pub fn matches_tags(&self, tags: &[String]) -> bool {
        self.matches
            .iter()
            .any(|tag| tags.iter().any(|t| t.eq_ignore_ascii_case(tag.trim())))
    }

    #[inline]
    pub fn suggestion(&self) -> Suggestion {
        Suggestion {
            label: self.label.clone(),
            link: self.link.clone(),
        }
    }
}

/// Walk documents in rank order and rules in declared order, keeping the first
/// suggestion per label, at most `max` of them.
#[inline]
pub fn suggest<'a, I>(rules: &[SuggestionRule], documents: I, max: usize) -> Vec<Suggestion>
where
    I: IntoIterator<Item = &'a Document>,
{
    documents
        .into_iter()
        .flat_map(|document| {
            let tags = document.category_tags();
            rules
                .iter()
                .filter(move |rule| rule.matches_tags(&tags))
        })
        .unique_by(|rule| rule.label.clone())
        .take(max)
        .map(SuggestionRule::suggestion)
        .collect()
}

/// Suggestions shown with the general-help answer
#[inline]
pub fn default_suggestions(rules: &[SuggestionRule], max: usize) -> Vec<Suggestion> {
    rules
        .iter()
        .unique_by(|rule| rule.label.clone())
        .take(max)
        .map(SuggestionRule::suggestion)
        .collect()
}
