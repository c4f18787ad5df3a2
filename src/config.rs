use anyhow::{bail, Result};
use serde::Deserialize;

/// Maximum upload accepted by the transcription endpoint
pub const DEFAULT_MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub openai: OpenAIConfig,
    pub audio: AudioConfig,
    pub run: RunConfig,
    pub attachments: AttachmentsConfig,
    pub vector_store: VectorStoreConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "assistant-relay".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub assistant_id: String,
    pub base_url: String,
    pub transcription_model: String,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            assistant_id: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            transcription_model: "whisper-1".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Captures growing past this many bytes are dropped
    pub max_buffer_bytes: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            max_buffer_bytes: DEFAULT_MAX_AUDIO_BYTES,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Upper bound on one streamed run, start to terminal event
    pub stream_timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            stream_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AttachmentsConfig {
    /// Also grant `code_interpreter` on every uploaded attachment
    pub code_interpreter: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub name: String,
    pub file_ids: Vec<String>,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            name: "Product Documentation".to_string(),
            file_ids: Vec::new(),
        }
    }
}

impl Config {
    /// Load from an optional config file plus the environment
    ///
    /// `OPENAI_API_KEY` and `OPENAI_ASSISTANT_ID` take precedence over the
    /// file; any key can also be set as `ASSISTANT_RELAY__SECTION__KEY`.
    pub fn load(path: &str) -> Result<Self> {
        Self::load_with_credentials(
            path,
            std::env::var("OPENAI_API_KEY").ok(),
            std::env::var("OPENAI_ASSISTANT_ID").ok(),
        )
    }

    /// Same as [`Config::load`] with the credential overrides passed in
    pub fn load_with_credentials(
        path: &str,
        api_key: Option<String>,
        assistant_id: Option<String>,
    ) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("ASSISTANT_RELAY").separator("__"))
            .set_override_option("openai.api_key", api_key)?
            .set_override_option("openai.assistant_id", assistant_id)?
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.openai.api_key.trim().is_empty() {
            bail!("OpenAI API key is not configured (set OPENAI_API_KEY)");
        }
        if self.openai.assistant_id.trim().is_empty() {
            bail!("Assistant id is not configured (set OPENAI_ASSISTANT_ID)");
        }
        if self.audio.max_buffer_bytes == 0 {
            bail!("audio.max_buffer_bytes must be greater than zero");
        }
        Ok(())
    }
}
