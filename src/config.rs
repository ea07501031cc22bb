use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{LazyLock, RwLock},
    time::SystemTime,
};

use clap::Parser;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sysinfo::System;
use tokio::{fs, io::AsyncReadExt};

fn camel_to_snake_case(input: &str) -> String {
    let mut snake = String::new();
    for (i, ch) in input.char_indices() {
        if i > 0 && ch.is_uppercase() {
            snake.push('_');
        }
        snake.push(ch.to_ascii_lowercase());
    }
    snake
}

/// One configuration setting. Value sources are layered: a cli flag beats an
/// environment variable, which beats the config file, which beats the
/// auto-tuned value, which beats the compiled default.
pub trait ConfigValue:
    'static + Send + Sync + Default + Clone + Serialize + DeserializeOwned + utoipa::ToSchema
{
    const KEY: Option<&str> = None;
    const ENV_KEY: Option<&str> = None;
}

#[derive(Debug, Default)]
struct SettingValue<T> {
    default: T,
    auto: Option<T>,
    config: Option<T>,
    cli: Option<T>,
    env: Option<T>,
}

impl<T: ConfigValue> SettingValue<T> {
    pub fn new(val: T) -> Self {
        use std::env::var;
        let env = match T::ENV_KEY {
            Some(key) => Some(key.to_string()),
            None => Some(T::KEY.map(str::to_uppercase).unwrap_or_else(|| {
                let name = T::name();
                camel_to_snake_case(&name).to_uppercase()
            })),
        }
        .and_then(|env_key| {
            let val = var(env_key).ok()?;
            match serde_plain::from_str(&val) {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!(
                        found = val,
                        "Found env value but could not parse it as {}. {e}",
                        type_name::<T>()
                    );
                    None
                }
            }
        });
        Self {
            default: val,
            auto: None,
            config: None,
            cli: None,
            env,
        }
    }

    /// Setting value with respect to it's source priority
    pub fn customized(&self) -> &T {
        self.cli
            .as_ref()
            .or(self.env.as_ref())
            .or(self.config.as_ref())
            .or(self.auto.as_ref())
            .unwrap_or(&self.default)
    }
}

trait AnySettingValue: 'static + Send + Sync {
    fn key(&self) -> String;
    fn type_name(&self) -> std::borrow::Cow<'static, str>;

    fn customized_value(&self) -> &dyn Any;
    fn config_mut(&mut self) -> &mut dyn Any;
    fn cli_mut(&mut self) -> &mut dyn Any;
    fn auto_mut(&mut self) -> &mut dyn Any;

    fn deserialize_toml(&mut self, from: toml::Value) -> Result<(), toml::de::Error>;
}

impl<T: ConfigValue> AnySettingValue for SettingValue<T> {
    fn key(&self) -> String {
        T::KEY
            .map(|k| k.to_string())
            .unwrap_or_else(|| camel_to_snake_case(&self.type_name()))
    }

    fn type_name(&self) -> std::borrow::Cow<'static, str> {
        T::name()
    }

    fn deserialize_toml(&mut self, from: toml::Value) -> Result<(), toml::de::Error> {
        let value = T::deserialize(from)?;
        self.config = Some(value);
        Ok(())
    }

    fn customized_value(&self) -> &dyn Any {
        self.customized()
    }

    fn config_mut(&mut self) -> &mut dyn Any {
        &mut self.config
    }

    fn cli_mut(&mut self) -> &mut dyn Any {
        &mut self.cli
    }

    fn auto_mut(&mut self) -> &mut dyn Any {
        &mut self.auto
    }
}

pub static CONFIG: LazyLock<ConfigStore> = LazyLock::new(ConfigStore::construct);

pub struct ConfigStore {
    settings: RwLock<HashMap<TypeId, Box<dyn AnySettingValue>>>,
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore").finish()
    }
}

impl ConfigStore {
    pub fn construct() -> Self {
        let store = Self::new();

        store.register_value::<Port>();
        store.register_value::<BaseUrl>();
        store.register_value::<DevMode>();
        store.register_value::<TmdbKey>();
        store.register_value::<MetadataLanguage>();
        store.register_value::<CheapSlots>();
        store.register_value::<ExpensiveSlots>();
        store.register_value::<PluginTimeoutSeconds>();
        store.register_value::<MaxResultsPerPlugin>();
        store.register_value::<ProbeAtStreamTime>();
        store.register_value::<MaxProbeCount>();
        store.register_value::<ProbeTimeoutSeconds>();
        store.register_value::<ProbeConcurrency>();
        store.register_value::<TitleMatchThreshold>();
        store.register_value::<TitleYearBonus>();
        store.register_value::<TitleYearPenalty>();
        store.register_value::<TitleSequelPenalty>();
        store.register_value::<TitleYearToleranceMovie>();
        store.register_value::<TitleYearToleranceSeries>();
        store.register_value::<LanguageScores>();
        store.register_value::<DefaultLanguageScore>();
        store.register_value::<QualityMultiplier>();
        store.register_value::<HosterScores>();
        store.register_value::<SizeBonus>();
        store.register_value::<SearchTtlSeconds>();
        store.register_value::<CircuitFailureThreshold>();
        store.register_value::<CircuitCooldownSeconds>();

        store
    }

    pub fn new() -> Self {
        Self {
            settings: RwLock::new(HashMap::new()),
        }
    }

    pub fn register_value<T: ConfigValue>(&self) {
        let default = T::default();
        self.settings
            .write()
            .unwrap()
            .insert(TypeId::of::<T>(), Box::new(SettingValue::new(default)));
    }

    pub fn get_value<T: ConfigValue>(&self) -> T {
        let settings = self.settings.read().unwrap();
        let setting = settings
            .get(&TypeId::of::<T>())
            .unwrap_or_else(|| panic!("unregistered setting type {}", type_name::<T>()));
        let t: &T = setting.customized_value().downcast_ref().unwrap();
        t.clone()
    }

    pub fn update_value<T: ConfigValue>(&self, new: T) {
        let mut settings = self.settings.write().unwrap();
        let setting = settings
            .get_mut(&TypeId::of::<T>())
            .unwrap_or_else(|| panic!("unregistered setting type {}", type_name::<T>()));
        let value = setting.config_mut();
        let value = value.downcast_mut().unwrap();
        *value = Some(new);
    }

    pub fn apply_toml_settings(&self, table: toml::Table) {
        let mut settings = self.settings.write().unwrap();
        for setting in settings.values_mut() {
            let key = setting.key();
            if let Some(val) = table.get(&key).cloned() {
                if let Err(err) = setting.deserialize_toml(val) {
                    tracing::warn!(
                        "Failed to deserialize toml value for {}: {err}",
                        setting.type_name()
                    )
                };
            }
        }
    }

    pub fn apply_cli_value<T: ConfigValue>(&self, value: T) {
        let mut settings = self.settings.write().unwrap();
        let setting = settings.get_mut(&value.type_id()).unwrap();
        let setting = setting.cli_mut();
        let val = setting.downcast_mut().unwrap();
        *val = Some(value);
    }

    pub fn apply_auto_value<T: ConfigValue>(&self, value: T) {
        let mut settings = self.settings.write().unwrap();
        let setting = settings.get_mut(&value.type_id()).unwrap();
        let setting = setting.auto_mut();
        let val = setting.downcast_mut().unwrap();
        *val = Some(value);
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

// Settings

/// The network port on which the server listens for incoming connections
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct Port(pub u16);

impl Default for Port {
    fn default() -> Self {
        Self(8000)
    }
}

impl ConfigValue for Port {}

/// Externally reachable base url of this server. When set, stream responses
/// carry proxy play urls instead of raw hoster embeds
#[derive(Debug, Deserialize, Clone, Default, Serialize, utoipa::ToSchema)]
pub struct BaseUrl(pub Option<String>);
impl ConfigValue for BaseUrl {}

/// Development mode. Upstream failures surface as http errors with details
/// instead of empty feeds
#[derive(Debug, Deserialize, Clone, Copy, Default, Serialize, utoipa::ToSchema)]
pub struct DevMode(pub bool);
impl ConfigValue for DevMode {}

/// API key for TMDB. Allows server to authenticate with TMDB metadata provider
#[derive(Debug, Deserialize, Clone, Default, Serialize, utoipa::ToSchema)]
pub struct TmdbKey(pub Option<String>);
impl ConfigValue for TmdbKey {
    const ENV_KEY: Option<&str> = Some("TMDB_API_KEY");
}

/// Locale used for reference title lookups. Scraped sites are German, so
/// matching against the German title is the default
#[derive(Debug, Deserialize, Clone, Serialize, utoipa::ToSchema)]
pub struct MetadataLanguage(pub String);
impl ConfigValue for MetadataLanguage {}
impl Default for MetadataLanguage {
    fn default() -> Self {
        Self("de-DE".to_string())
    }
}

/// Size of the slot pool shared by plain http adapters
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct CheapSlots(pub usize);
impl ConfigValue for CheapSlots {}
impl Default for CheapSlots {
    fn default() -> Self {
        Self(10)
    }
}

/// Size of the slot pool shared by headless browser adapters
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct ExpensiveSlots(pub usize);
impl ConfigValue for ExpensiveSlots {}
impl Default for ExpensiveSlots {
    fn default() -> Self {
        Self(2)
    }
}

/// Per adapter search call timeout in seconds
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct PluginTimeoutSeconds(pub u64);
impl ConfigValue for PluginTimeoutSeconds {}
impl Default for PluginTimeoutSeconds {
    fn default() -> Self {
        Self(30)
    }
}

/// Cap on results taken from a single adapter before filtering
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct MaxResultsPerPlugin(pub usize);
impl ConfigValue for MaxResultsPerPlugin {}
impl Default for MaxResultsPerPlugin {
    fn default() -> Self {
        Self(50)
    }
}

/// Probe stream liveness with HEAD requests before answering
#[derive(Debug, Deserialize, Clone, Copy, Default, Serialize, utoipa::ToSchema)]
pub struct ProbeAtStreamTime(pub bool);
impl ConfigValue for ProbeAtStreamTime {}

/// Upper bound on probes issued per request
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct MaxProbeCount(pub usize);
impl ConfigValue for MaxProbeCount {}
impl Default for MaxProbeCount {
    fn default() -> Self {
        Self(10)
    }
}

/// Single probe request timeout in seconds
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct ProbeTimeoutSeconds(pub u64);
impl ConfigValue for ProbeTimeoutSeconds {}
impl Default for ProbeTimeoutSeconds {
    fn default() -> Self {
        Self(5)
    }
}

/// Concurrent probe requests per stream response
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct ProbeConcurrency(pub usize);
impl ConfigValue for ProbeConcurrency {}
impl Default for ProbeConcurrency {
    fn default() -> Self {
        Self(8)
    }
}

/// Minimal title similarity for a result to survive the title match filter
#[derive(Debug, Deserialize, PartialEq, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct TitleMatchThreshold(pub f64);
impl ConfigValue for TitleMatchThreshold {}
impl Default for TitleMatchThreshold {
    fn default() -> Self {
        Self(0.5)
    }
}

/// Similarity bonus when the candidate year is within tolerance
#[derive(Debug, Deserialize, PartialEq, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct TitleYearBonus(pub f64);
impl ConfigValue for TitleYearBonus {}
impl Default for TitleYearBonus {
    fn default() -> Self {
        Self(0.1)
    }
}

/// Similarity penalty when the candidate year is outside tolerance
#[derive(Debug, Deserialize, PartialEq, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct TitleYearPenalty(pub f64);
impl ConfigValue for TitleYearPenalty {}
impl Default for TitleYearPenalty {
    fn default() -> Self {
        Self(0.15)
    }
}

/// Similarity penalty for a different installment of the same franchise
#[derive(Debug, Deserialize, PartialEq, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct TitleSequelPenalty(pub f64);
impl ConfigValue for TitleSequelPenalty {}
impl Default for TitleSequelPenalty {
    fn default() -> Self {
        Self(0.3)
    }
}

/// Allowed year difference for movie candidates
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct TitleYearToleranceMovie(pub i32);
impl ConfigValue for TitleYearToleranceMovie {}
impl Default for TitleYearToleranceMovie {
    fn default() -> Self {
        Self(1)
    }
}

/// Allowed year difference for series candidates
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct TitleYearToleranceSeries(pub i32);
impl ConfigValue for TitleYearToleranceSeries {}
impl Default for TitleYearToleranceSeries {
    fn default() -> Self {
        Self(0)
    }
}

/// Score per audio language code. German dubs rank far above everything else
#[derive(Debug, Deserialize, Clone, Serialize, utoipa::ToSchema)]
pub struct LanguageScores(pub HashMap<String, i64>);
impl ConfigValue for LanguageScores {}
impl Default for LanguageScores {
    fn default() -> Self {
        Self(HashMap::from([
            ("de".to_string(), 1000),
            ("en".to_string(), 150),
        ]))
    }
}

/// Score for languages missing from the language score table
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct DefaultLanguageScore(pub i64);
impl ConfigValue for DefaultLanguageScore {}
impl Default for DefaultLanguageScore {
    fn default() -> Self {
        Self(100)
    }
}

/// Multiplier applied to the quality ordinal when scoring streams
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct QualityMultiplier(pub i64);
impl ConfigValue for QualityMultiplier {}
impl Default for QualityMultiplier {
    fn default() -> Self {
        Self(10)
    }
}

/// Score per normalized hoster name
#[derive(Debug, Deserialize, Clone, Serialize, utoipa::ToSchema)]
pub struct HosterScores(pub HashMap<String, i64>);
impl ConfigValue for HosterScores {}
impl Default for HosterScores {
    fn default() -> Self {
        Self(HashMap::from([("voe".to_string(), 4)]))
    }
}

/// Score bonus for streams whose reported size falls into the plausible band
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct SizeBonus(pub i64);
impl ConfigValue for SizeBonus {}
impl Default for SizeBonus {
    fn default() -> Self {
        Self(5)
    }
}

/// Default search result cache lifetime in seconds. Adapters may override it
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct SearchTtlSeconds(pub u64);
impl ConfigValue for SearchTtlSeconds {}
impl Default for SearchTtlSeconds {
    fn default() -> Self {
        Self(3600)
    }
}

/// Consecutive failures before an adapter's circuit opens
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct CircuitFailureThreshold(pub u32);
impl ConfigValue for CircuitFailureThreshold {}
impl Default for CircuitFailureThreshold {
    fn default() -> Self {
        Self(5)
    }
}

/// Seconds an open circuit waits before admitting a probe call
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct CircuitCooldownSeconds(pub u64);
impl ConfigValue for CircuitCooldownSeconds {}
impl Default for CircuitCooldownSeconds {
    fn default() -> Self {
        Self(300)
    }
}

// Auto tune

#[derive(Debug, Clone, Copy)]
pub struct DetectedResources {
    pub cpu_cores: usize,
    pub memory_bytes: u64,
}

pub fn detect_resources() -> DetectedResources {
    let mut system = System::new();
    system.refresh_memory();
    system.refresh_cpu_list(sysinfo::CpuRefreshKind::nothing());
    let cpu_cores = system.cpus().len().max(1);
    DetectedResources {
        cpu_cores,
        memory_bytes: system.total_memory(),
    }
}

/// Derive slot pool sizes from the machine. Every formula is monotonic in
/// both cpu count and memory, and the outputs are clamped to the documented
/// ranges. Explicit configuration always wins over these values.
pub fn auto_tune(resources: DetectedResources) {
    let cpus = resources.cpu_cores as u64;
    let ram_gib = resources.memory_bytes / (1024 * 1024 * 1024);

    let cheap = (cpus * 2).min(ram_gib.max(1) * 4).clamp(2, 30);
    let expensive = (cpus / 2).min(ram_gib / 2).clamp(1, 10);
    let probe = (cpus * 4).clamp(4, 100);

    tracing::info!(
        cpus,
        ram_gib,
        cheap,
        expensive,
        probe,
        "Auto-tuned concurrency from detected resources"
    );

    CONFIG.apply_auto_value(CheapSlots(cheap as usize));
    CONFIG.apply_auto_value(ExpensiveSlots(expensive as usize));
    CONFIG.apply_auto_value(ProbeConcurrency(probe as usize));
}

#[derive(Debug)]
pub struct ConfigFile(pub fs::File);

impl ConfigFile {
    pub async fn open(config_path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        if let Some(parent) = config_path.as_ref().parent() {
            fs::create_dir_all(parent).await?;
        }
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&config_path)
            .await?;
        tracing::debug!("Opened config file {}", config_path.as_ref().display());
        Ok(Self(file))
    }

    /// Open and read config file dropping file handle.
    pub async fn open_and_read() -> anyhow::Result<toml::Table> {
        let mut config = Self::open(&APP_RESOURCES.config_path).await?;
        config.read().await
    }

    /// Read config file
    pub async fn read(&mut self) -> Result<toml::Table, anyhow::Error> {
        let mut raw = String::new();
        let read = self.0.read_to_string(&mut raw).await?;
        tracing::debug!("Read {read} bytes from config file");
        let table: toml::Table = toml::from_str(&raw)?;
        Ok(table)
    }
}

#[derive(Debug, Parser, Deserialize, Serialize)]
#[command(version)]
pub struct Args {
    /// Override port
    #[arg(short, long)]
    pub port: Option<u16>,
    /// Override tmdb api key
    #[arg(long)]
    pub tmdb_key: Option<String>,
    /// Externally reachable base url, enables proxy play urls
    #[arg(long)]
    pub base_url: Option<String>,
    /// Run in development mode
    #[arg(long)]
    pub dev: bool,
}

impl Args {
    pub fn apply_configuration(self) {
        if let Some(port) = self.port {
            CONFIG.apply_cli_value(Port(port));
        }
        if let Some(key) = self.tmdb_key {
            CONFIG.apply_cli_value(TmdbKey(Some(key)));
        }
        if let Some(base_url) = self.base_url {
            CONFIG.apply_cli_value(BaseUrl(Some(base_url)));
        }
        if self.dev {
            CONFIG.apply_cli_value(DevMode(true));
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AppResources {
    pub start_time: SystemTime,
    #[serde(skip)]
    pub config_path: PathBuf,
    pub log_path: PathBuf,
    pub os: String,
    pub os_version: String,
    pub app_version: &'static str,
}

pub static APP_RESOURCES: LazyLock<AppResources> = LazyLock::new(AppResources::new);

impl AppResources {
    pub const APP_NAME: &'static str = "scavengarr";

    fn data_storage() -> PathBuf {
        if Self::is_prod() {
            dirs::data_local_dir()
                .expect("target to have data directory")
                .join(Self::APP_NAME)
        } else {
            PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        }
    }

    pub fn is_prod() -> bool {
        !cfg!(debug_assertions)
    }

    pub fn default_config_path() -> PathBuf {
        if Self::is_prod() {
            dirs::config_local_dir()
                .expect("target supports config dir")
                .join(Self::APP_NAME)
        } else {
            Self::data_storage()
        }
        .join("configuration.toml")
    }

    pub fn log() -> PathBuf {
        Self::data_storage().join("log.log")
    }

    pub fn initiate() -> Result<(), std::io::Error> {
        use std::fs;
        fs::create_dir_all(Self::data_storage())?;
        fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(Self::log())?;
        Ok(())
    }

    pub fn new() -> Self {
        let start_time = SystemTime::now();
        let config_path = Self::default_config_path();
        let log_path = Self::log();
        let (os_version, os) = System::kernel_version()
            .zip(System::long_os_version())
            .unwrap_or_else(|| ("unknown".to_string(), "unknown".to_string()));
        let app_version = std::env!("CARGO_PKG_VERSION");

        tracing::debug!(path = %config_path.display(), "Selected config path");
        tracing::debug!(path = %log_path.display(), "Selected log path");
        tracing::info!("Server version: {app_version}");

        Self {
            start_time,
            config_path,
            log_path,
            os,
            os_version,
            app_version,
        }
    }
}

impl Default for AppResources {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_TOML_CONFIG: &str = r#"
port = 8100
probe_at_stream_time = true
cheap_slots = 4
    "#;

    #[test]
    fn setting_store() {
        let store = ConfigStore::construct();
        let mut port = Port::default();
        let stored_port: Port = store.get_value();
        assert_eq!(port, stored_port);
        port = Port(8100);
        store.update_value(port);
        let stored_port: Port = store.get_value();
        assert_eq!(port, stored_port);
    }

    #[test]
    fn apply_settings() {
        let store = ConfigStore::construct();
        let port: Port = store.get_value();
        assert_eq!(port.0, Port::default().0);
        let toml = toml::from_str(TEST_TOML_CONFIG).unwrap();
        store.apply_toml_settings(toml);
        let port: Port = store.get_value();
        let probe: ProbeAtStreamTime = store.get_value();
        let cheap: CheapSlots = store.get_value();
        assert_eq!(port.0, 8100);
        assert!(probe.0);
        assert_eq!(cheap.0, 4);
    }

    #[test]
    fn explicit_config_beats_auto_tune() {
        let store = ConfigStore::construct();
        store.apply_auto_value(CheapSlots(24));
        let cheap: CheapSlots = store.get_value();
        assert_eq!(cheap.0, 24);
        let toml = toml::from_str("cheap_slots = 6").unwrap();
        store.apply_toml_settings(toml);
        let cheap: CheapSlots = store.get_value();
        assert_eq!(cheap.0, 6);
    }

    #[test]
    fn auto_tune_is_monotonic_and_bounded() {
        let levels = [
            (1usize, 2u64),
            (2, 4),
            (4, 8),
            (8, 16),
            (16, 32),
            (32, 64),
        ];
        let mut prev = (0u64, 0u64, 0u64);
        for (cpus, ram_gib) in levels {
            let cpus = cpus as u64;
            let cheap = (cpus * 2).min(ram_gib.max(1) * 4).clamp(2, 30);
            let expensive = (cpus / 2).min(ram_gib / 2).clamp(1, 10);
            let probe = (cpus * 4).clamp(4, 100);
            assert!((2..=30).contains(&cheap));
            assert!((1..=10).contains(&expensive));
            assert!(probe >= 4);
            assert!(cheap >= prev.0 && expensive >= prev.1 && probe >= prev.2);
            prev = (cheap, expensive, probe);
        }
    }
}
