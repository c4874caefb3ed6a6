use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Settings shared by every relay session
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Upper bound on one session, including a tool follow-up round
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "duration_str::deserialize_duration"
    )]
    pub request_timeout: Duration,
    /// TCP connect timeout for upstream requests
    #[serde(
        default = "default_connect_timeout",
        deserialize_with = "duration_str::deserialize_duration"
    )]
    pub connect_timeout: Duration,
    /// Characters per simulated chunk when replaying a single-shot answer
    #[serde(default = "default_simulated_chunk_chars")]
    pub simulated_chunk_chars: usize,
    /// Pause between simulated chunks
    #[serde(
        default = "default_simulated_chunk_delay",
        deserialize_with = "duration_str::deserialize_duration"
    )]
    pub simulated_chunk_delay: Duration,
    /// Token budget for dialects that require one
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Directory image references are resolved against
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Directory generated images are written to
    #[serde(default = "default_image_output_dir")]
    pub image_output_dir: PathBuf,
    /// How long a generated-image listing stays fresh
    #[serde(
        default = "default_image_catalog_ttl",
        deserialize_with = "duration_str::deserialize_duration"
    )]
    pub image_catalog_ttl: Duration,
    /// Default system prompt for every turn
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Override for the instruction appended when tools are enabled
    #[serde(default)]
    pub tool_instruction: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            simulated_chunk_chars: default_simulated_chunk_chars(),
            simulated_chunk_delay: default_simulated_chunk_delay(),
            max_tokens: default_max_tokens(),
            upload_dir: default_upload_dir(),
            image_output_dir: default_image_output_dir(),
            image_catalog_ttl: default_image_catalog_ttl(),
            system_prompt: None,
            tool_instruction: None,
        }
    }
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(320)
}

const fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

const fn default_simulated_chunk_chars() -> usize {
    16
}

const fn default_simulated_chunk_delay() -> Duration {
    Duration::from_millis(15)
}

const fn default_max_tokens() -> u32 {
    4096
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_image_output_dir() -> PathBuf {
    PathBuf::from("generated")
}

const fn default_image_catalog_ttl() -> Duration {
    Duration::from_secs(30)
}
