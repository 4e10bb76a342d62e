use regex::{Regex, RegexBuilder};

/// Currency markers accepted when no locale narrows the set.
pub const DEFAULT_CURRENCIES: &[&str] = &[
    "сом", "сум", "sum", "som", "$", "USD", "KGS", "UZS", "AZN", "GEL", "манат", "лари",
];

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("at least one currency marker is required")]
    NoCurrencies,
    #[error("invalid relevance pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub trait RelevanceFilter: Send + Sync {
    fn is_relevant(&self, text: &str) -> bool;
}

/// Matches a number followed by a currency marker, e.g. `15000 сом` or `1.200$`.
#[derive(Debug, Clone)]
pub struct PricePatternFilter {
    pattern: Regex,
}

impl PricePatternFilter {
    pub fn new<S: AsRef<str>>(currencies: &[S]) -> Result<Self, FilterError> {
        let alternation = currencies
            .iter()
            .map(|c| regex::escape(c.as_ref().trim()))
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join("|");
        if alternation.is_empty() {
            return Err(FilterError::NoCurrencies);
        }
        let pattern = RegexBuilder::new(&format!(r"\d+[\s.,]?\d*\s*(?:{alternation})"))
            .case_insensitive(true)
            .build()?;
        Ok(Self { pattern })
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

impl Default for PricePatternFilter {
    fn default() -> Self {
        Self::new(DEFAULT_CURRENCIES).expect("escaped default currencies form a valid pattern")
    }
}

impl RelevanceFilter for PricePatternFilter {
    fn is_relevant(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}
