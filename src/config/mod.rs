use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// OpenAI API configuration
    pub openai: OpenAiConfig,

    /// Audio chunking settings
    pub chunking: ChunkingConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key; filled from OPENAI_API_KEY at startup when empty
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,

    /// Base URL of the API endpoint
    pub base_url: String,

    /// Speech-to-text model
    pub whisper_model: String,

    /// Chat model used for translation and summarization
    pub chat_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum duration of one audio chunk in seconds
    pub max_chunk_secs: f64,

    /// Upload size ceiling per chunk in bytes (the API rejects ~25 MB)
    pub max_chunk_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Temporary directory override for downloads and chunks
    pub temp_dir: Option<PathBuf>,

    /// Default directory for exported transcripts
    pub output_dir: PathBuf,

    /// Keep downloaded audio files after transcription
    pub keep_audio: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai: OpenAiConfig {
                api_key: String::new(),
                base_url: "https://api.openai.com/v1".to_string(),
                whisper_model: "whisper-1".to_string(),
                chat_model: "gpt-4o-mini".to_string(),
            },
            chunking: ChunkingConfig {
                max_chunk_secs: 600.0,
                max_chunk_bytes: 25 * 1024 * 1024,
            },
            app: AppConfig {
                temp_dir: None,
                output_dir: PathBuf::from("transcriptions"),
                keep_audio: false,
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create the default one
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            serde_yaml::from_str(&content).context("Failed to parse config file")?
        } else {
            let config = Self::default();
            config.save().await?;
            config
        };

        // Environment always wins; the key is read once here at startup
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                config.openai.api_key = key;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file (without the API key)
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // Current directory takes priority for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("omniscribe").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.chunking.max_chunk_secs <= 0.0 {
            anyhow::bail!("max_chunk_secs must be positive");
        }

        if self.chunking.max_chunk_bytes == 0 {
            anyhow::bail!("max_chunk_bytes must be positive");
        }

        Ok(())
    }

    /// Fail early if no API key is configured
    pub fn require_api_key(&self) -> Result<&str> {
        if self.openai.api_key.is_empty() {
            anyhow::bail!(
                "No API key configured. Set the OPENAI_API_KEY environment variable or add it to the config file."
            );
        }
        Ok(&self.openai.api_key)
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  API base URL: {}", self.openai.base_url);
        println!("  Whisper model: {}", self.openai.whisper_model);
        println!("  Chat model: {}", self.openai.chat_model);
        println!(
            "  API key: {}",
            if self.openai.api_key.is_empty() {
                "(not set)"
            } else {
                "(set)"
            }
        );
        println!("  Max chunk duration: {}s", self.chunking.max_chunk_secs);
        println!("  Max chunk size: {} bytes", self.chunking.max_chunk_bytes);
        println!("  Output dir: {}", self.app.output_dir.display());
        println!("  Keep audio: {}", self.app.keep_audio);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_chunk_duration_rejected() {
        let mut config = Config::default();
        config.chunking.max_chunk_secs = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_api_key_reported() {
        let config = Config::default();
        assert!(config.require_api_key().is_err());

        let mut config = Config::default();
        config.openai.api_key = "sk-test".to_string();
        assert_eq!(config.require_api_key().unwrap(), "sk-test");
    }
}
