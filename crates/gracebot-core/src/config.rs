use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

pub const DEFAULT_PROFANITY_REPLY: &str =
    "Please mind your language. I can't answer messages that contain offensive words.";
pub const DEFAULT_FALLBACK_REPLY: &str =
    "Sorry, I don't know about that yet. Try asking \"what is ...?\".";

/// Language-understanding service settings. Present only when fully configured.
#[derive(Clone, Debug)]
pub struct LuisConfig {
    pub endpoint: String,
    pub app_id: String,
    pub key: String,
    pub min_score: f64,
}

/// Typed configuration for the bot host.
#[derive(Clone, Debug)]
pub struct Config {
    // Static resources
    pub bad_words_path: PathBuf,
    pub dictionary_path: PathBuf,

    // Persistence (None = in-memory)
    pub store_path: Option<PathBuf>,

    // Webhook / connector
    pub listen_addr: String,
    pub connector_token: Option<String>,
    pub http_timeout: Duration,

    // Replies
    pub profanity_reply: String,
    pub fallback_reply: String,

    // Classification
    pub luis: Option<LuisConfig>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let bad_words_path = env_path("GRACEBOT_BAD_WORDS_PATH")
            .unwrap_or_else(|| PathBuf::from("BadWords/en"));
        let dictionary_path = env_path("GRACEBOT_DICTIONARY_PATH")
            .unwrap_or_else(|| PathBuf::from("Words/dictionary.json"));

        let store_path = env_str("GRACEBOT_STORE_PATH")
            .and_then(non_empty)
            .map(PathBuf::from);

        let listen_addr = env_str("GRACEBOT_LISTEN_ADDR")
            .and_then(non_empty)
            .unwrap_or_else(|| "0.0.0.0:3978".to_string());
        let connector_token = env_str("GRACEBOT_CONNECTOR_TOKEN").and_then(non_empty);
        let http_timeout =
            Duration::from_millis(env_parse::<u64>("GRACEBOT_HTTP_TIMEOUT_MS")?.unwrap_or(10_000));

        let profanity_reply = env_str("GRACEBOT_PROFANITY_REPLY")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_PROFANITY_REPLY.to_string());
        let fallback_reply = env_str("GRACEBOT_FALLBACK_REPLY")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_FALLBACK_REPLY.to_string());

        let luis = load_luis()?;

        Ok(Self {
            bad_words_path,
            dictionary_path,
            store_path,
            listen_addr,
            connector_token,
            http_timeout,
            profanity_reply,
            fallback_reply,
            luis,
        })
    }
}

fn load_luis() -> Result<Option<LuisConfig>> {
    let endpoint = env_str("LUIS_ENDPOINT").and_then(non_empty);
    let app_id = env_str("LUIS_APP_ID").and_then(non_empty);
    let key = env_str("LUIS_KEY").and_then(non_empty);
    let min_score = match env_parse::<f64>("LUIS_MIN_SCORE")? {
        Some(v) => check_min_score(v)?,
        None => 0.5,
    };

    match (endpoint, app_id, key) {
        (Some(endpoint), Some(app_id), Some(key)) => Ok(Some(LuisConfig {
            endpoint,
            app_id,
            key,
            min_score,
        })),
        (None, None, None) => Ok(None),
        _ => Err(Error::Config(
            "LUIS_ENDPOINT, LUIS_APP_ID and LUIS_KEY must be set together".to_string(),
        )),
    }
}

/// Intent scores are probabilities; NaN would let every result through.
fn check_min_score(v: f64) -> Result<f64> {
    if v.is_finite() && (0.0..=1.0).contains(&v) {
        Ok(v)
    } else {
        Err(Error::Config(format!(
            "LUIS_MIN_SCORE={v} must be a number between 0 and 1"
        )))
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = env_str(key).and_then(non_empty) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|e| Error::Config(format!("{key}={raw:?} is invalid: {e}")))
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };
    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
