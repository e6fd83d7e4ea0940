use {
    super::{ClientConfig, ConfigError, RangeManagerConfig},
    serde::Deserialize,
    std::{fs, path::Path, str::FromStr, time::Duration},
    tracing::warn,
};

/// Host-supplied allocator settings.
///
/// Usually loaded from a TOML file and then overridden from the environment:
///
/// ```toml
/// [authority]
/// address = "http://range-allocator:50051"
/// dial_timeout_ms = 5000
///
/// [allocation]
/// service_id = "shortener-1"
/// range_size = 1000
/// region = "eu-west"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AllocatorConfig {
    pub authority: AuthoritySection,
    pub allocation: AllocationSection,
}

/// Where and how to reach the range authority.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthoritySection {
    pub address: String,
    pub dial_timeout_ms: u64,
    pub request_timeout_ms: Option<u64>,
}

/// What to ask the authority for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AllocationSection {
    pub service_id: String,
    pub range_size: i64,
    pub region: Option<String>,
    pub lease_timeout_ms: Option<u64>,
}

impl Default for AuthoritySection {
    fn default() -> Self {
        Self {
            address: String::new(),
            dial_timeout_ms: 5_000,
            request_timeout_ms: None,
        }
    }
}

impl Default for AllocationSection {
    fn default() -> Self {
        Self {
            service_id: String::new(),
            range_size: RangeManagerConfig::DEFAULT_RANGE_SIZE,
            region: None,
            lease_timeout_ms: None,
        }
    }
}

impl FromStr for AllocatorConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s).map_err(|err| ConfigError::Load(err.to_string()))
    }
}

impl AllocatorConfig {
    /// Reads the file at `path` and applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|err| ConfigError::Load(format!("failed to read {}: {err}", path.display())))?;
        let mut config: Self = contents.parse()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden from the environment only.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides looked up through `lookup`.
    ///
    /// Blank values are ignored; unparsable values are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        if let Some(address) = get("RANGE_ALLOCATOR_ADDRESS") {
            self.authority.address = address;
        }
        if let Some(ms) = parsed(&get, "RANGE_ALLOCATOR_DIAL_TIMEOUT_MS") {
            self.authority.dial_timeout_ms = ms;
        }
        if let Some(ms) = parsed(&get, "RANGE_ALLOCATOR_REQUEST_TIMEOUT_MS") {
            self.authority.request_timeout_ms = Some(ms);
        }
        if let Some(service_id) = get("SERVICE_ID") {
            self.allocation.service_id = service_id;
        }
        if let Some(size) = parsed(&get, "RANGE_SIZE") {
            self.allocation.range_size = size;
        }
        if let Some(region) = get("RANGE_REGION") {
            self.allocation.region = Some(region);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.authority.address.is_empty() {
            return Err(ConfigError::EmptyAddress);
        }
        self.manager_config().validate()
    }

    /// Settings for [`GrpcClient`](crate::GrpcClient).
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            address: self.authority.address.clone(),
            dial_timeout: Duration::from_millis(self.authority.dial_timeout_ms),
            request_timeout: self.authority.request_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Settings for [`RangeManager`](crate::RangeManager).
    pub fn manager_config(&self) -> RangeManagerConfig {
        RangeManagerConfig {
            service_id: self.allocation.service_id.clone(),
            range_size: self.allocation.range_size,
            region: self.allocation.region.clone().filter(|r| !r.is_empty()),
            lease_timeout: self.allocation.lease_timeout_ms.map(Duration::from_millis),
        }
    }
}

fn parsed<T: FromStr>(get: impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let raw = get(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("invalid {key}, ignoring: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::collections::HashMap};

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn parse_full_file() {
        let config: AllocatorConfig = r#"
            [authority]
            address = "http://allocator:50051"
            dial_timeout_ms = 2500
            request_timeout_ms = 300

            [allocation]
            service_id = "shortener-1"
            range_size = 500
            region = "eu-west"
            lease_timeout_ms = 1000
        "#
        .parse()
        .unwrap();
        assert!(config.validate().is_ok());

        let client = config.client_config();
        assert_eq!(client.address, "http://allocator:50051");
        assert_eq!(client.dial_timeout, Duration::from_millis(2500));
        assert_eq!(client.request_timeout, Some(Duration::from_millis(300)));

        let manager = config.manager_config();
        assert_eq!(manager.service_id, "shortener-1");
        assert_eq!(manager.range_size, 500);
        assert_eq!(manager.region.as_deref(), Some("eu-west"));
        assert_eq!(manager.lease_timeout, Some(Duration::from_secs(1)));
    }

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config: AllocatorConfig = r#"
            [authority]
            address = "http://allocator:50051"

            [allocation]
            service_id = "svc"
        "#
        .parse()
        .unwrap();

        assert_eq!(config.client_config().dial_timeout, Duration::from_secs(5));
        assert_eq!(config.client_config().request_timeout, None);
        assert_eq!(config.manager_config().range_size, 1000);
        assert_eq!(config.manager_config().region, None);
    }

    #[test]
    fn rejects_unknown_fields() {
        let result = "[authority]\nadress = \"typo\"".parse::<AllocatorConfig>();
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn env_overrides() {
        let mut config = AllocatorConfig::default();
        config.apply_overrides(env(&[
            ("RANGE_ALLOCATOR_ADDRESS", " http://10.0.0.1:50051 "),
            ("RANGE_ALLOCATOR_DIAL_TIMEOUT_MS", "100"),
            ("SERVICE_ID", "shortener-7"),
            ("RANGE_SIZE", "not-a-number"),
            ("RANGE_REGION", ""),
        ]));

        assert_eq!(config.authority.address, "http://10.0.0.1:50051");
        assert_eq!(config.authority.dial_timeout_ms, 100);
        assert_eq!(config.allocation.service_id, "shortener-7");
        // Invalid and blank values leave the defaults in place.
        assert_eq!(config.allocation.range_size, 1000);
        assert_eq!(config.allocation.region, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation() {
        let mut config = AllocatorConfig::default();
        assert_eq!(config.validate(), Err(ConfigError::EmptyAddress));

        config.authority.address = "http://allocator:50051".to_string();
        assert_eq!(config.validate(), Err(ConfigError::EmptyServiceId));

        config.allocation.service_id = "svc".to_string();
        config.allocation.range_size = -5;
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositiveRangeSize(-5))
        );
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            AllocatorConfig::load("/nonexistent/allocator.toml"),
            Err(ConfigError::Load(_))
        ));
    }
}
