use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How long to wait after a create event before opening the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum SettleStrategy {
    /// Sleep for a fixed grace period. Partial writes slower than this are
    /// not detected.
    FixedDelay {
        #[serde(with = "millis")]
        delay: Duration,
    },
    /// Poll the file size until two consecutive polls agree, giving up after
    /// `max_polls` polls.
    StableSize {
        #[serde(with = "millis")]
        interval: Duration,
        max_polls: u32,
    },
}

impl Default for SettleStrategy {
    fn default() -> Self {
        SettleStrategy::FixedDelay {
            delay: Duration::from_secs(2),
        }
    }
}

impl SettleStrategy {
    pub fn none() -> Self {
        SettleStrategy::FixedDelay {
            delay: Duration::ZERO,
        }
    }

    /// Block until the file is considered complete. Returns `false` only when
    /// a stable-size wait ran out of polls.
    pub async fn wait(&self, path: &Path) -> bool {
        match *self {
            SettleStrategy::FixedDelay { delay } => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                true
            }
            SettleStrategy::StableSize {
                interval,
                max_polls,
            } => {
                let mut last = file_len(path).await;
                for _ in 0..max_polls {
                    tokio::time::sleep(interval).await;
                    let current = file_len(path).await;
                    if current.is_some() && current == last {
                        return true;
                    }
                    last = current;
                }
                tracing::warn!(path = %path.display(), max_polls, "file size never settled");
                false
            }
        }
    }
}

async fn file_len(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path).await.ok().map(|m| m.len())
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
