pub mod actor;
pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod http;
pub mod session;
pub mod store;
pub mod timer;
pub mod types;
pub mod voice;

pub use actor::{ActorConfig, SessionActor, SessionEvent, SessionHandle, TranscriptOutcome};
pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{clarification_prompt, interpret, CommandIntent};
pub use config::{Config, StoreSpec};
pub use error::{
    ActorError, ConfigError, ExtractError, FetchError, ParseRecipeError, PersistenceError,
    UrlError, ValidationError,
};
pub use extract::{extract_recipe, extract_recipe_with_report};
pub use fetch::{parse_recipe_url, validate_url, HostPolicy};
pub use http::{FetchClient, FetchClientBuilder, HttpClient, MockClient, MockResponse};
pub use session::{Session, SessionPatch};
pub use store::{FileStore, HttpStore, MemoryStore, SessionStore};
pub use timer::{create_timer, format_remaining, Timer, TimerEngine, TimerView};
pub use types::{ExtractionAttempt, ExtractionMethod, ExtractionReport, Recipe, RecipeField};
pub use voice::{announcement, spawn_narrator, LogSpeaker, SpeechSink};
