/// Field used to order book search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Title,
    Price,
}

impl SortKey {
    /// Unknown keys yield `None`, which leaves results unsorted.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "title" => Some(SortKey::Title),
            "price" => Some(SortKey::Price),
            _ => None,
        }
    }
}

/// Book search filters. Empty strings and `None` disable a filter.
#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    /// Case-insensitive substring of the title.
    pub title: String,
    /// Whitespace separated words, any of which may match the author's
    /// first or last name.
    pub author: String,
    /// Exact genre membership.
    pub genre: String,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub sort_by: Option<SortKey>,
    pub descending: bool,
}
