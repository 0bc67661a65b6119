use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Placeholder title when a page offers no heading or `<title>`.
pub const DEFAULT_TITLE: &str = "Parsed recipe";

/// Upper bound on ingredients and steps kept from a single page.
pub const MAX_ITEMS: usize = 30;

/// A recipe extracted from a page. Both lists are non-empty when it comes
/// from the extractor; recipes read off the wire are checked by their users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Recipe {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub steps: Vec<String>,
}

impl Recipe {
    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn step(&self, index: usize) -> Option<&str> {
        self.steps.get(index).map(String::as_str)
    }
}

/// Which field an extraction strategy targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipeField {
    Title,
    Ingredients,
    Steps,
}

/// Identifies how a set of matches was located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// schema.org `itemprop` attributes
    Microdata,
    /// schema.org Recipe inside `application/ld+json`
    JsonLd,
    /// Recipe-plugin or site-specific class and id selectors
    HtmlClass,
    /// Bare `li` / `p` elements
    Generic,
    /// `<h1>` or `<title>`
    Heading,
    /// Nothing matched; a placeholder was used
    Default,
}

/// Result of trying one strategy for one field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionAttempt {
    pub field: RecipeField,
    pub method: ExtractionMethod,
    /// Selector or JSON-LD property that was evaluated
    pub pattern: String,
    /// Number of nodes the pattern matched before cleaning
    pub matches: usize,
    pub accepted: bool,
}

/// A recipe together with a record of how it was found.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub recipe: Recipe,
    pub title_method: ExtractionMethod,
    pub ingredients_method: ExtractionMethod,
    pub steps_method: ExtractionMethod,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<ExtractionAttempt>,
}
