//! Read-only menu search used by the chat widget's ordering helper.


use serde::Serialize;

use crate::database::models::MenuItem;

pub const MAX_SEARCH_RESULTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuItemSummary {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub image_url: Option<String>,
}

impl From<&MenuItem> for MenuItemSummary {
    #[inline]
    fn from(item: &MenuItem) -> Self {
        Self {
            id: item.id,
            name: item.name.clone(),
            description: item.description.clone(),
            price: item.price,
            category: item.category.clone(),
            image_url: item.image_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuSearch {
    pub found: bool,
    pub items: Vec<MenuItemSummary>,
    pub message: String,
}

/// Which strategy produced the results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    Contains,
    Fuzzy,
    None,
}

/// Search `items` (expected to be the available ones) in three tiers: exact
/// name, substring of name/description/category, then a whitespace-insensitive
/// fuzzy match. The first tier with any hit wins.
#[inline]
pub fn search_menu(items: &[MenuItem], query: &str) -> MenuSearch {
    let query = query.trim().to_lowercase();
    let (tier, matches) = find_matches(items, &query);

    if tier == MatchTier::None {
        return MenuSearch {
            found: false,
            items: Vec::new(),
            message: format!(
                "Sorry, we don't have '{}' on our menu. Would you like to see our available items?",
                query
            ),
        };
    }

    let items: Vec<MenuItemSummary> = matches
        .into_iter()
        .take(MAX_SEARCH_RESULTS)
        .map(MenuItemSummary::from)
        .collect();
    MenuSearch {
        found: true,
        message: format!("Found {} item(s) matching '{}'", items.len(), query),
        items,
    }
}

/// `query` must already be trimmed and lowercased
#[inline]
pub fn find_matches<'a>(items: &'a [MenuItem], query: &str) -> (MatchTier, Vec<&'a MenuItem>) {
    let exact: Vec<&MenuItem> = items
        .iter()
        .filter(|item| item.name.to_lowercase() == query)
        .collect();
    if !exact.is_empty() {
        return (MatchTier::Exact, exact);
    }

    let contains: Vec<&MenuItem> = items
        .iter()
        .filter(|item| {
            item.name.to_lowercase().contains(query)
                || item.description.to_lowercase().contains(query)
                || item.category.to_lowercase().contains(query)
        })
        .collect();
    if !contains.is_empty() {
        return (MatchTier::Contains, contains);
    }

    let compact_query = compact(query);
    let words: Vec<&str> = query
        .split_whitespace()
        .filter(|word| word.chars().count() > 2)
        .collect();
    let fuzzy: Vec<&MenuItem> = items
        .iter()
        .filter(|item| {
            let name = compact(&item.name.to_lowercase());
            (!compact_query.is_empty()
                && (name.contains(&compact_query) || compact_query.contains(&name)))
                || words.iter().any(|word| name.contains(word))
        })
        .collect();
    if fuzzy.is_empty() {
        (MatchTier::None, fuzzy)
    } else {
        (MatchTier::Fuzzy, fuzzy)
    }
}

fn compact(text: &str) -> String {
    text.split_whitespace().collect()
}
