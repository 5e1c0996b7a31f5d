use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(with = "humantime_serde")]
    pub processing_tick: Duration,
    #[serde(with = "humantime_serde")]
    pub adc_connect_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub live_interval: Duration,
    pub live_event_cap: u32,
    pub log_capacity: usize,
    #[serde(with = "humantime_serde")]
    pub log_max_age: Duration,
    #[serde(with = "humantime_serde")]
    pub log_sweep_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub export_delay: Duration,
    pub export_dir: PathBuf,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            processing_tick: Duration::from_millis(100),
            adc_connect_delay: Duration::from_secs(1),
            live_interval: Duration::from_secs(1),
            live_event_cap: 30,
            log_capacity: 100,
            log_max_age: Duration::from_secs(30 * 60),
            log_sweep_interval: Duration::from_secs(5 * 60),
            export_delay: Duration::from_millis(500),
            export_dir: PathBuf::from("."),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    #[default]
    None,
    File,
    Adc,
    Live,
}

impl DataSource {
    pub fn label(self) -> &'static str {
        match self {
            DataSource::None => "Not connected",
            DataSource::File => "File",
            DataSource::Adc => "ADC",
            DataSource::Live => "Live mode",
        }
    }
}

impl FromStr for DataSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(DataSource::File),
            "adc" => Ok(DataSource::Adc),
            "live" => Ok(DataSource::Live),
            "none" => Ok(DataSource::None),
            other => Err(anyhow::anyhow!(
                "unknown data source '{other}' (expected file, adc or live)"
            )),
        }
    }
}

/// Detection algorithm selectable by the operator. Selection only; nothing
/// here executes a detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Algorithm {
    #[default]
    #[serde(rename = "hybrid")]
    Hybrid,
    #[serde(rename = "gaussian")]
    Gaussian,
    #[serde(rename = "statistical")]
    Statistical,
    #[serde(rename = "ml-cnn")]
    CnnModel,
    #[serde(rename = "ml-lstm")]
    LstmModel,
}

impl Algorithm {
    pub const ALL: [Algorithm; 5] = [
        Algorithm::Hybrid,
        Algorithm::Gaussian,
        Algorithm::Statistical,
        Algorithm::CnnModel,
        Algorithm::LstmModel,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            Algorithm::Hybrid => "Hybrid algorithm",
            Algorithm::Gaussian => "Gaussian detection",
            Algorithm::Statistical => "Statistical analysis (gSPRT)",
            Algorithm::CnnModel => "CNN model",
            Algorithm::LstmModel => "LSTM model",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Algorithm::Hybrid => "hybrid",
            Algorithm::Gaussian => "gaussian",
            Algorithm::Statistical => "statistical",
            Algorithm::CnnModel => "ml-cnn",
            Algorithm::LstmModel => "ml-lstm",
        }
    }
}

impl FromStr for Algorithm {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Algorithm::ALL
            .into_iter()
            .find(|a| a.key() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown algorithm '{s}'"))
    }
}

/// Numeric configuration handed to the (stubbed) detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub kernel_width_ms: f64,
    pub threshold_sigma: f64,
    pub min_duration_ms: f64,
    pub max_duration_ms: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            kernel_width_ms: 0.1,
            threshold_sigma: 3.5,
            min_duration_ms: 0.1,
            max_duration_ms: 2.0,
        }
    }
}

impl Parameters {
    pub fn get(&self, field: ParameterField) -> f64 {
        match field {
            ParameterField::KernelWidthMs => self.kernel_width_ms,
            ParameterField::ThresholdSigma => self.threshold_sigma,
            ParameterField::MinDurationMs => self.min_duration_ms,
            ParameterField::MaxDurationMs => self.max_duration_ms,
        }
    }

    pub fn set(&mut self, field: ParameterField, value: f64) {
        match field {
            ParameterField::KernelWidthMs => self.kernel_width_ms = value,
            ParameterField::ThresholdSigma => self.threshold_sigma = value,
            ParameterField::MinDurationMs => self.min_duration_ms = value,
            ParameterField::MaxDurationMs => self.max_duration_ms = value,
        }
    }

    /// Display label with the fixed precision the panel uses for each field.
    pub fn label(&self, field: ParameterField) -> String {
        let v = self.get(field);
        match field {
            ParameterField::ThresholdSigma => format!("{v:.1} σ"),
            _ => format!("{v:.2} ms"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterField {
    KernelWidthMs,
    ThresholdSigma,
    MinDurationMs,
    MaxDurationMs,
}

impl ParameterField {
    pub const ALL: [ParameterField; 4] = [
        ParameterField::KernelWidthMs,
        ParameterField::ThresholdSigma,
        ParameterField::MinDurationMs,
        ParameterField::MaxDurationMs,
    ];

    pub fn title(self) -> &'static str {
        match self {
            ParameterField::KernelWidthMs => "Kernel width",
            ParameterField::ThresholdSigma => "Threshold",
            ParameterField::MinDurationMs => "Min crash duration",
            ParameterField::MaxDurationMs => "Max crash duration",
        }
    }

    /// Increment used by the control panel's slider keys.
    #[cfg(feature = "tui")]
    pub fn step(self) -> f64 {
        match self {
            ParameterField::ThresholdSigma => 0.1,
            ParameterField::KernelWidthMs | ParameterField::MinDurationMs => 0.01,
            ParameterField::MaxDurationMs => 0.1,
        }
    }
}

impl std::fmt::Display for ParameterField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ParameterField::KernelWidthMs => "kernel_width_ms",
            ParameterField::ThresholdSigma => "threshold_sigma",
            ParameterField::MinDurationMs => "min_duration_ms",
            ParameterField::MaxDurationMs => "max_duration_ms",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    System,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn icon(self) -> &'static str {
        match self {
            Severity::System => "🔧",
            Severity::Success => "✅",
            Severity::Warning => "⚠️",
            Severity::Error => "❌",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Insertion order; strictly increasing across the session.
    pub seq: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub severity: Severity,
    pub message: String,
}

/// Metadata supplied by the file loader. The file content is never read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub modified: Option<OffsetDateTime>,
}

impl FileDescriptor {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size_bytes: 0,
            mime_type: None,
            modified: None,
        }
    }

    /// One-line summary for the operator: name, size in KB and type.
    pub fn summary(&self) -> String {
        let kb = self.size_bytes as f64 / 1024.0;
        let mime = self.mime_type.as_deref().unwrap_or("Unknown format");
        format!("{} · {:.2} KB · {}", self.name, kb, mime)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedFile {
    pub descriptor: FileDescriptor,
    #[serde(with = "time::serde::rfc3339")]
    pub loaded_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingRun {
    pub progress_percent: u8,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartLayer {
    RawSignal,
    Processed,
    Detections,
}

/// Visualization preferences handed to the chart renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartView {
    pub show_raw: bool,
    pub show_processed: bool,
    pub show_detections: bool,
    pub zoom: i32,
}

impl Default for ChartView {
    fn default() -> Self {
        Self {
            show_raw: true,
            show_processed: true,
            show_detections: true,
            zoom: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub connected: bool,
    pub data_source: DataSource,
    pub algorithm: Algorithm,
    pub applied_algorithm: Algorithm,
    pub run: Option<ProcessingRun>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_process_time: Option<OffsetDateTime>,
    pub detection_count: u32,
    pub loaded_file: Option<LoadedFile>,
    pub view: ChartView,
}

impl Session {
    pub fn processing(&self) -> bool {
        self.run.is_some()
    }
}

/// Operator commands accepted by the session controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    LoadFile { file: FileDescriptor },
    ConnectAdc,
    EnableLiveMode,
    SelectAlgorithm { algorithm: Algorithm },
    ApplyAlgorithm,
    SetParameterDraft { field: ParameterField, value: f64 },
    ApplyParameters,
    ResetParameters,
    StartProcessing,
    StopProcessing,
    ClearLog,
    Export,
    SetLayerVisible { layer: ChartLayer, visible: bool },
    ZoomIn,
    ZoomOut,
    ResetView,
}

/// Display-ready projection of the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySnapshot {
    pub data_source: String,
    pub algorithm: String,
    pub last_process_time: String,
    pub detection_count: String,
    pub start_enabled: bool,
    pub stop_enabled: bool,
    pub progress_percent: Option<u8>,
    pub connected: bool,
    pub loaded_file: Option<String>,
    pub kernel_width: String,
    pub threshold: String,
    pub min_duration: String,
    pub max_duration: String,
    pub view: ChartView,
}

impl DisplaySnapshot {
    /// Committed parameter labels in slider order.
    pub fn parameter_values(&self) -> [(ParameterField, &str); 4] {
        let [k, t, min, max] = ParameterField::ALL;
        [
            (k, self.kernel_width.as_str()),
            (t, self.threshold.as_str()),
            (min, self.min_duration.as_str()),
            (max, self.max_duration.as_str()),
        ]
    }
}
