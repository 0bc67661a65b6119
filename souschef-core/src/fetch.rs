//! Turning a recipe URL into a [`Recipe`]: validate, fetch, extract.

use url::Url;

use crate::error::{ParseRecipeError, UrlError};
use crate::extract::extract_recipe;
use crate::http::HttpClient;
use crate::types::Recipe;

/// Which hosts recipe URLs may point at.
///
/// An empty allow-list admits every host. Entries match the bare host, the
/// `host:port` pair, or any subdomain of the entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostPolicy {
    allowed: Vec<String>,
}

impl HostPolicy {
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn allow_only<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: hosts
                .into_iter()
                .map(|h| h.as_ref().trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    /// Parse a comma-separated list, e.g. `allrecipes.com,localhost:8080`.
    pub fn from_list(list: &str) -> Self {
        Self::allow_only(list.split(','))
    }

    pub fn is_unrestricted(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn permits(&self, host: &str, port: Option<u16>) -> bool {
        if self.allowed.is_empty() {
            return true;
        }
        let host = host.to_ascii_lowercase();
        let host_with_port = port.map(|p| format!("{}:{}", host, p));

        self.allowed.iter().any(|entry| {
            *entry == host
                || host_with_port.as_deref() == Some(entry.as_str())
                || host.ends_with(&format!(".{}", entry))
        })
    }
}

/// Check that `raw` is an http(s) URL whose host the policy admits.
pub fn validate_url(raw: &str, policy: &HostPolicy) -> Result<Url, UrlError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlError::Malformed("Missing URL".to_string()));
    }

    let parsed = Url::parse(raw).map_err(|e| UrlError::Malformed(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(UrlError::UnsupportedScheme(parsed.scheme().to_string()));
    }

    let host = parsed.host_str().ok_or(UrlError::MissingHost)?;
    if !policy.permits(host, parsed.port()) {
        let shown = match parsed.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        return Err(UrlError::HostNotAllowed(shown));
    }

    Ok(parsed)
}

/// Validate, fetch and extract a recipe from `url`.
pub async fn parse_recipe_url(
    client: &dyn HttpClient,
    url: &str,
    policy: &HostPolicy,
) -> Result<Recipe, ParseRecipeError> {
    let parsed = validate_url(url, policy)?;
    let html = client.fetch_html(parsed.as_str()).await?;
    tracing::debug!(url = %parsed, bytes = html.len(), "fetched recipe page");
    Ok(extract_recipe(&html)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractError, FetchError};
    use crate::http::MockClient;

    const RECIPE_HTML: &str = r#"
        <html><body>
            <h1>Toast</h1>
            <ul><li itemprop="recipeIngredient">bread</li><li itemprop="recipeIngredient">butter</li></ul>
            <div itemprop="recipeInstructions"><p>Toast the bread.</p><p>Butter it.</p></div>
        </body></html>
    "#;

    #[test]
    fn test_policy_matches_host_port_and_subdomains() {
        let policy = HostPolicy::from_list("allrecipes.com, localhost:8080");
        assert!(policy.permits("allrecipes.com", None));
        assert!(policy.permits("www.allrecipes.com", None));
        assert!(policy.permits("localhost", Some(8080)));
        assert!(!policy.permits("localhost", Some(9090)));
        assert!(!policy.permits("notallrecipes.com", None));
    }

    #[test]
    fn test_validate_url_errors() {
        let open = HostPolicy::allow_all();
        assert!(matches!(
            validate_url("", &open),
            Err(UrlError::Malformed(_))
        ));
        assert!(matches!(
            validate_url("not a url", &open),
            Err(UrlError::Malformed(_))
        ));
        assert!(matches!(
            validate_url("ftp://example.com/x", &open),
            Err(UrlError::UnsupportedScheme(_))
        ));

        let strict = HostPolicy::allow_only(["allrecipes.com"]);
        assert_eq!(
            validate_url("https://example.com/recipe", &strict),
            Err(UrlError::HostNotAllowed("example.com".to_string()))
        );
        assert!(validate_url("https://www.allrecipes.com/recipe/1", &strict).is_ok());
    }

    #[tokio::test]
    async fn test_parse_recipe_url_success() {
        let client = MockClient::new().with_html("https://example.com/toast", RECIPE_HTML);
        let recipe = parse_recipe_url(&client, "https://example.com/toast", &HostPolicy::default())
            .await
            .unwrap();
        assert_eq!(recipe.title, "Toast");
        assert_eq!(recipe.steps, vec!["Toast the bread.", "Butter it."]);
    }

    #[tokio::test]
    async fn test_parse_recipe_url_distinguishes_failures() {
        let client = MockClient::new()
            .with_status("https://example.com/missing", 404)
            .with_html("https://example.com/empty", "<html><body></body></html>");
        let policy = HostPolicy::default();

        let err = parse_recipe_url(&client, "https://example.com/missing", &policy)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ParseRecipeError::Fetch(FetchError::Status { status: 404, .. })
        ));

        let err = parse_recipe_url(&client, "https://example.com/empty", &policy)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ParseRecipeError::Extract(ExtractError::NoIngredients)
        ));

        let err = parse_recipe_url(&client, "nope", &policy).await.unwrap_err();
        assert!(matches!(err, ParseRecipeError::InvalidUrl(_)));
    }
}
