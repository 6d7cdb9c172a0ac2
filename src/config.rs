//! Configuration types for remux-dl

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Download behavior configuration (output location, polling, naming)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory downloads are written to (default: "./downloads")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Interval between progress snapshots (default: 3 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Extension appended to output names that lack it (default: "mp4")
    #[serde(default = "default_output_extension")]
    pub output_extension: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            poll_interval: default_poll_interval(),
            output_extension: default_output_extension(),
        }
    }
}

/// External tool location
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for ffmpeg if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            search_path: true,
        }
    }
}

/// How the ffmpeg process is invoked and supervised
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Audio bitstream filter applied while stream-copying (default: "aac_adtstoasc")
    ///
    /// Needed to move ADTS AAC (as found in HLS/MPEG-TS sources) into MP4/MKV containers.
    #[serde(default = "default_audio_bitstream_filter")]
    pub audio_bitstream_filter: String,

    /// Overwrite an existing output file instead of failing (default: true)
    #[serde(default = "default_true")]
    pub overwrite: bool,

    /// Time ffmpeg gets to exit after SIGTERM before it is killed (default: 5 seconds)
    #[serde(default = "default_terminate_grace_period", with = "duration_serde")]
    pub terminate_grace_period: Duration,

    /// Upper bound on the captured diagnostic output kept per job (default: 1 MiB)
    ///
    /// Oldest lines are dropped first once the bound is exceeded.
    #[serde(default = "default_max_diagnostic_bytes")]
    pub max_diagnostic_bytes: usize,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            audio_bitstream_filter: default_audio_bitstream_filter(),
            overwrite: true,
            terminate_grace_period: default_terminate_grace_period(),
            max_diagnostic_bytes: default_max_diagnostic_bytes(),
        }
    }
}

/// Main configuration for [`RemuxDownloader`](crate::RemuxDownloader)
///
/// Fields are organized into logical sub-configs:
/// - [`download`](DownloadConfig): output directory, poll interval, naming
/// - [`tools`](ToolsConfig): ffmpeg binary location
/// - [`process`](ProcessConfig): invocation and termination policy
///
/// All sub-config fields are flattened, so the serialized form has no nesting.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior settings
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// External tool paths
    #[serde(flatten)]
    pub tools: ToolsConfig,

    /// Process supervision settings
    #[serde(flatten)]
    pub process: ProcessConfig,
}

impl Config {
    /// Output directory
    pub fn output_dir(&self) -> &PathBuf {
        &self.download.output_dir
    }

    /// Check settings that serde cannot reject on its own
    pub fn validate(&self) -> crate::Result<()> {
        if self.download.poll_interval.is_zero() {
            return Err(crate::Error::Config {
                message: "poll interval must be greater than zero".to_string(),
                key: Some("poll_interval".to_string()),
            });
        }

        let extension = self.download.output_extension.trim_start_matches('.');
        if extension.is_empty() || extension.contains(['/', '\\']) {
            return Err(crate::Error::Config {
                message: format!(
                    "invalid output extension: {:?}",
                    self.download.output_extension
                ),
                key: Some("output_extension".to_string()),
            });
        }

        Ok(())
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(3)
}

fn default_output_extension() -> String {
    "mp4".to_string()
}

fn default_true() -> bool {
    true
}

fn default_audio_bitstream_filter() -> String {
    "aac_adtstoasc".to_string()
}

fn default_terminate_grace_period() -> Duration {
    Duration::from_secs(5)
}

fn default_max_diagnostic_bytes() -> usize {
    1024 * 1024
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
