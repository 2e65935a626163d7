use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::Grade, errors::Error, Result};

/// Typed configuration, loaded from the environment (with `.env` support).
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,

    /// Root for all bot-owned state: `lessons/` (chapter + lesson index
    /// files) and `users.db`.
    pub data_dir: PathBuf,

    /// Cadence of the subscription lifecycle sweeper.
    pub sweep_interval: Duration,

    /// Length of one paid period, in days.
    pub subscription_days: i64,

    /// Price of one period, in tenge.
    pub subscription_price: u32,

    /// Payment requisites shown to subscribing users.
    pub payment_details: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let data_dir = env_path("DATA_DIR").unwrap_or_else(|| PathBuf::from("data"));
        fs::create_dir_all(data_dir.join("lessons"))?;

        let sweep_interval = Duration::from_secs(env_u64("SWEEP_INTERVAL_SECS").unwrap_or(600));
        let subscription_days = env_u64("SUBSCRIPTION_DAYS").unwrap_or(30) as i64;
        let subscription_price = env_u32("SUBSCRIPTION_PRICE").unwrap_or(4990);
        let payment_details = env_str("PAYMENT_DETAILS")
            .and_then(non_empty)
            .unwrap_or_else(|| "+7 701 234 5678".to_string());

        Ok(Self {
            telegram_bot_token,
            data_dir,
            sweep_interval,
            subscription_days,
            subscription_price,
            payment_details,
        })
    }

    /// Shared chapter index file, sectioned by grade.
    pub fn chapters_file(&self) -> PathBuf {
        self.data_dir.join("lessons").join("chapters.txt")
    }

    pub fn lessons_dir(&self) -> PathBuf {
        self.data_dir.join("lessons")
    }

    pub fn lessons_file(&self, grade: Grade) -> PathBuf {
        self.lessons_dir().join(format!("grade_{grade}.txt"))
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("users.db")
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

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
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
