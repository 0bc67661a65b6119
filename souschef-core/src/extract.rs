//! Recipe content extraction from raw HTML.
//!
//! Every field is located by walking an ordered list of strategies. For the
//! ingredient and step lists a strategy only wins when it matches more than one
//! node, so a single stray element never passes for a whole list.

use scraper::{ElementRef, Html, Selector};
use serde_json::Value as JsonValue;

use crate::error::ExtractError;
use crate::types::{
    ExtractionAttempt, ExtractionMethod, ExtractionReport, Recipe, RecipeField, DEFAULT_TITLE,
    MAX_ITEMS,
};

/// Where a strategy looks for its matches.
#[derive(Debug, Clone, Copy)]
enum Source {
    Css(&'static str),
    JsonLd(&'static str),
}

#[derive(Debug, Clone, Copy)]
struct Strategy {
    method: ExtractionMethod,
    source: Source,
}

const fn css(method: ExtractionMethod, selector: &'static str) -> Strategy {
    Strategy {
        method,
        source: Source::Css(selector),
    }
}

const fn json_ld(property: &'static str) -> Strategy {
    Strategy {
        method: ExtractionMethod::JsonLd,
        source: Source::JsonLd(property),
    }
}

/// Site-specific headings tried before the generic `<h1>` / `<title>`.
const TITLE_SELECTORS: &[&str] = &[
    "#article-heading_1-0",
    ".wprm-recipe-name",
    ".jetpack-recipe-title",
    ".tasty-recipes-title",
];

const INGREDIENT_STRATEGIES: &[Strategy] = &[
    css(ExtractionMethod::Microdata, r#"[itemprop="recipeIngredient"]"#),
    css(ExtractionMethod::Microdata, r#"[itemprop="ingredients"]"#),
    json_ld("recipeIngredient"),
    css(
        ExtractionMethod::HtmlClass,
        "#mm-recipes-structured-ingredients_1-0 li",
    ),
    css(ExtractionMethod::HtmlClass, ".wprm-recipe-ingredient"),
    css(ExtractionMethod::HtmlClass, ".tasty-recipes-ingredients li"),
    css(ExtractionMethod::HtmlClass, ".jetpack-recipe-ingredient"),
    css(ExtractionMethod::HtmlClass, ".recipe-ingredients li"),
    css(ExtractionMethod::HtmlClass, ".ingredients li"),
    css(ExtractionMethod::HtmlClass, ".ingredient li"),
    css(ExtractionMethod::Generic, "li"),
];

const STEP_STRATEGIES: &[Strategy] = &[
    css(ExtractionMethod::Microdata, r#"[itemprop="recipeInstructions"] li"#),
    css(ExtractionMethod::Microdata, r#"[itemprop="recipeInstructions"] p"#),
    css(ExtractionMethod::Microdata, r#"[itemprop="recipeInstructions"]"#),
    json_ld("recipeInstructions"),
    css(ExtractionMethod::HtmlClass, "#mm-recipes-steps_1-0 li"),
    css(ExtractionMethod::HtmlClass, ".wprm-recipe-instruction"),
    css(ExtractionMethod::HtmlClass, ".tasty-recipes-instructions li"),
    css(ExtractionMethod::HtmlClass, ".jetpack-recipe-directions p"),
    css(ExtractionMethod::HtmlClass, ".recipe-instructions li"),
    css(ExtractionMethod::HtmlClass, ".instruction li"),
    css(ExtractionMethod::HtmlClass, ".instructions li"),
    css(ExtractionMethod::Generic, "p"),
];

/// Extract a recipe from a full HTML document.
pub fn extract_recipe(html: &str) -> Result<Recipe, ExtractError> {
    extract_recipe_with_report(html).map(|report| report.recipe)
}

/// Extract a recipe and report which strategy produced each field.
pub fn extract_recipe_with_report(html: &str) -> Result<ExtractionReport, ExtractError> {
    let document = Html::parse_document(html);
    let json_ld_recipe = find_json_ld_recipe(&document);
    let mut attempts = Vec::new();

    let (title, title_method) = extract_title(&document, &mut attempts);

    let (ingredients, ingredients_method) = extract_list(
        &document,
        json_ld_recipe.as_ref(),
        RecipeField::Ingredients,
        INGREDIENT_STRATEGIES,
        &mut attempts,
    );
    let (steps, steps_method) = extract_list(
        &document,
        json_ld_recipe.as_ref(),
        RecipeField::Steps,
        STEP_STRATEGIES,
        &mut attempts,
    );

    if ingredients.is_empty() {
        tracing::debug!(title = %title, "no ingredient strategy matched");
        return Err(ExtractError::NoIngredients);
    }
    if steps.is_empty() {
        tracing::debug!(title = %title, "no step strategy matched");
        return Err(ExtractError::NoSteps);
    }

    tracing::debug!(
        title = %title,
        ingredients = ingredients.len(),
        steps = steps.len(),
        ?ingredients_method,
        ?steps_method,
        "recipe extracted"
    );

    Ok(ExtractionReport {
        recipe: Recipe {
            title,
            ingredients,
            steps,
        },
        title_method,
        ingredients_method,
        steps_method,
        attempts,
    })
}

fn extract_title(
    document: &Html,
    attempts: &mut Vec<ExtractionAttempt>,
) -> (String, ExtractionMethod) {
    let candidates = TITLE_SELECTORS
        .iter()
        .map(|s| (ExtractionMethod::HtmlClass, *s))
        .chain([
            (ExtractionMethod::Heading, "h1"),
            (ExtractionMethod::Heading, "title"),
        ]);

    for (method, selector_str) in candidates {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        let first = document.select(&selector).next();
        let text = first
            .map(|el| normalize_whitespace(&el.text().collect::<String>()))
            .unwrap_or_default();
        let accepted = !text.is_empty();

        attempts.push(ExtractionAttempt {
            field: RecipeField::Title,
            method,
            pattern: selector_str.to_string(),
            matches: usize::from(first.is_some()),
            accepted,
        });

        if accepted {
            return (text, method);
        }
    }

    (DEFAULT_TITLE.to_string(), ExtractionMethod::Default)
}

/// Walk `strategies` in order; the first one matching more than one node wins.
fn extract_list(
    document: &Html,
    json_ld_recipe: Option<&JsonValue>,
    field: RecipeField,
    strategies: &[Strategy],
    attempts: &mut Vec<ExtractionAttempt>,
) -> (Vec<String>, ExtractionMethod) {
    for strategy in strategies {
        let (pattern, raw_items) = match strategy.source {
            Source::Css(selector_str) => {
                let Ok(selector) = Selector::parse(selector_str) else {
                    continue;
                };
                let items: Vec<String> = document
                    .select(&selector)
                    .map(|el| element_text(&el))
                    .collect();
                (selector_str, items)
            }
            Source::JsonLd(property) => {
                let items = json_ld_recipe
                    .and_then(|recipe| recipe.get(property))
                    .map(json_ld_items)
                    .unwrap_or_default();
                (property, items)
            }
        };

        let matches = raw_items.len();
        let accepted = matches > 1;
        attempts.push(ExtractionAttempt {
            field,
            method: strategy.method,
            pattern: pattern.to_string(),
            matches,
            accepted,
        });

        if accepted {
            tracing::debug!(?field, pattern, matches, "strategy accepted");
            let items = raw_items
                .iter()
                .map(|raw| clean_text(raw))
                .filter(|s| !s.is_empty())
                .take(MAX_ITEMS)
                .collect();
            return (items, strategy.method);
        }
    }

    (Vec::new(), ExtractionMethod::Default)
}

/// Text content of an element with all nested markup dropped.
fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>()
}

/// Collapse runs of whitespace to a single space and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize whitespace, then cut the text at the first `<` left over.
///
/// The cut is a heuristic for pages that ship half-escaped markup inside list
/// items; it is not a sanitizer.
pub fn clean_text(text: &str) -> String {
    let normalized = normalize_whitespace(text);
    match normalized.find('<') {
        Some(cut) => normalized[..cut].trim().to_string(),
        None => normalized,
    }
}

/// Locate the first schema.org Recipe object in the page's JSON-LD blocks.
fn find_json_ld_recipe(document: &Html) -> Option<JsonValue> {
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;

    for element in document.select(&selector) {
        let json_text = element.text().collect::<String>();
        let sanitized = sanitize_json(&json_text);
        let json: JsonValue = match serde_json::from_str(&sanitized) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unparseable JSON-LD block");
                continue;
            }
        };
        if let Some(recipe) = find_recipe_in_json(&json) {
            return Some(recipe.clone());
        }
    }
    None
}

/// Escape raw control characters that some sites leave inside JSON strings.
fn sanitize_json(json: &str) -> String {
    let mut result = String::with_capacity(json.len());
    let mut in_string = false;
    let mut prev_char = '\0';

    for c in json.chars() {
        if c == '"' && prev_char != '\\' {
            in_string = !in_string;
            result.push(c);
        } else if in_string {
            match c {
                '\n' => result.push_str("\\n"),
                '\r' => result.push_str("\\r"),
                '\t' => result.push_str("\\t"),
                c if c.is_control() => {}
                _ => result.push(c),
            }
        } else {
            result.push(c);
        }
        prev_char = c;
    }

    result
}

/// Recursively search for a Recipe object, descending into `@graph` and arrays.
fn find_recipe_in_json(json: &JsonValue) -> Option<&JsonValue> {
    match json {
        JsonValue::Object(obj) => {
            let is_recipe = match obj.get("@type") {
                Some(JsonValue::String(s)) => s == "Recipe",
                Some(JsonValue::Array(arr)) => arr.iter().any(|v| v == "Recipe"),
                _ => false,
            };
            if is_recipe {
                return Some(json);
            }
            obj.values().find_map(find_recipe_in_json)
        }
        JsonValue::Array(arr) => arr.iter().find_map(find_recipe_in_json),
        _ => None,
    }
}

/// Flatten a JSON-LD list property into plain strings.
///
/// Handles plain strings, newline-separated blobs, `HowToStep` objects and
/// `HowToSection` objects with nested `itemListElement`.
fn json_ld_items(value: &JsonValue) -> Vec<String> {
    let mut items = Vec::new();
    collect_json_ld_items(value, &mut items);
    items
}

fn collect_json_ld_items(value: &JsonValue, items: &mut Vec<String>) {
    match value {
        JsonValue::String(s) => items.extend(
            s.lines()
                .map(fragment_text)
                .filter(|line| !line.trim().is_empty()),
        ),
        JsonValue::Array(arr) => {
            for item in arr {
                collect_json_ld_items(item, items);
            }
        }
        JsonValue::Object(obj) => {
            if let Some(text) = obj.get("text").and_then(|v| v.as_str()) {
                items.push(fragment_text(text));
            } else if let Some(nested) = obj.get("itemListElement") {
                collect_json_ld_items(nested, items);
            } else if let Some(name) = obj.get("name").and_then(|v| v.as_str()) {
                items.push(fragment_text(name));
            }
        }
        _ => {}
    }
}

/// JSON-LD strings may carry markup and entities; read them as an HTML fragment.
fn fragment_text(raw: &str) -> String {
    if !raw.contains('<') && !raw.contains('&') {
        return raw.to_string();
    }
    Html::parse_fragment(raw)
        .root_element()
        .text()
        .collect::<String>()
}
