use thiserror::Error;

/// A recipe URL that cannot be used at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("Invalid URL: {0}")]
    Malformed(String),

    #[error("Invalid URL: no host in URL")]
    MissingHost,

    #[error("Invalid URL: unsupported scheme {0}")]
    UnsupportedScheme(String),

    #[error("URL host not allowed: {0}")]
    HostNotAllowed(String),
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    InvalidUrl(#[from] UrlError),

    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    #[error("Invalid response encoding: {0}")]
    InvalidEncoding(String),

    #[error("Fetch failed: {0}")]
    Other(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Unable to extract ingredients from the page")]
    NoIngredients,

    #[error("Unable to extract steps from the page")]
    NoSteps,
}

/// Malformed session, step or timer input at an interface boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid durationSeconds. Must be a positive number.")]
    NonPositiveDuration,

    #[error("stepIndex must be between 0 and {max} (inclusive). Received: {received}")]
    StepOutOfRange { received: i64, max: usize },

    #[error("Session does not contain a recipe")]
    MissingRecipe,

    #[error("Recipe has no steps")]
    NoSteps,

    #[error("Already at the last step")]
    AlreadyAtLastStep,

    #[error("Invalid currentStepIndex")]
    InvalidStepIndex,

    #[error("Invalid timer endTime. Must be epoch milliseconds.")]
    InvalidEndTime,

    #[error("{0}")]
    Malformed(String),
}

/// Failure writing or reading a session snapshot. Never fatal.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Session store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session snapshot could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Session store returned HTTP {0}")]
    Status(u16),

    #[error("Saved session rejected: {0}")]
    Invalid(#[from] ValidationError),
}

/// Everything that can go wrong turning a URL into a recipe.
#[derive(Error, Debug)]
pub enum ParseRecipeError {
    #[error(transparent)]
    InvalidUrl(#[from] UrlError),

    #[error(transparent)]
    Fetch(FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

impl From<FetchError> for ParseRecipeError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::InvalidUrl(e) => ParseRecipeError::InvalidUrl(e),
            other => ParseRecipeError::Fetch(other),
        }
    }
}

/// A command sent to a live session that could not be applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActorError {
    #[error("Session actor has stopped")]
    Stopped,

    #[error(transparent)]
    Rejected(#[from] ValidationError),
}

/// Bad environment configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber { var: String, value: String },

    #[error("Invalid session store {0:?}: expected memory, file:<path> or http:<url>")]
    InvalidStore(String),
}
