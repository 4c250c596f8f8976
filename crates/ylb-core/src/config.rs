use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration, read from the environment (and an optional `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub admin_user_id: i64,
    pub per_chat_throttle: Duration,

    // YOURLS
    pub yourls_url: String,
    pub yourls_signature: String,
    pub timestamped_signature: bool,
    pub http_timeout: Duration,

    // Listing cache
    pub cache_timeout: Duration,

    // Persistence
    pub state_file: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN")?;
        let yourls_url = required("YOURLS_URL")?.trim_end_matches('/').to_string();
        let yourls_signature = required("YOURLS_SIGNATURE")?;

        let admin_user_id = required("ADMIN_CHAT_ID")?
            .trim()
            .parse::<i64>()
            .map_err(|e| Error::Config(format!("ADMIN_CHAT_ID must be numeric: {e}")))?;

        let cache_timeout = Duration::from_secs(env_u64("CACHE_TIMEOUT").unwrap_or(60));
        let timestamped_signature = env_bool("YOURLS_TIMESTAMPED_SIGNATURE").unwrap_or(true);
        let http_timeout = Duration::from_millis(env_u64("YOURLS_TIMEOUT_MS").unwrap_or(10_000));
        let per_chat_throttle =
            Duration::from_millis(env_u64("TELEGRAM_THROTTLE_MS").unwrap_or(1050));

        let state_file = PathBuf::from(
            env_str("STATE_FILE").unwrap_or("/tmp/yourls-bot-state.json".to_string()),
        );

        Ok(Self {
            telegram_bot_token,
            admin_user_id,
            per_chat_throttle,
            yourls_url,
            yourls_signature,
            timestamped_signature,
            http_timeout,
            cache_timeout,
            state_file,
        })
    }
}

fn required(key: &str) -> Result<String> {
    env_str(key)
        .and_then(non_empty)
        .ok_or_else(|| Error::Config(format!("{key} environment variable is required")))
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
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

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotenv_strips_quotes_and_skips_comments() {
        let parsed = parse_dotenv(
            "# comment\nYOURLS_URL=\"https://sho.rt\"\n\nCACHE_TIMEOUT = 30\nbroken line\n=x\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("YOURLS_URL".to_string(), "https://sho.rt".to_string()),
                ("CACHE_TIMEOUT".to_string(), "30".to_string()),
            ]
        );
    }

    #[test]
    fn bool_flags_accept_common_spellings() {
        assert!(parse_bool("yes"));
        assert!(parse_bool(" ON "));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("nope"));
    }
}
