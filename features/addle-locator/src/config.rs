use std::{env, str::FromStr};

/// What happens when a second factory is registered for the same capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// The last registration wins, e.g. to swap in test doubles
    #[default]
    Overwrite,
    /// The second registration fails with [`LocatorError::DuplicateRegistration`](crate::LocatorError::DuplicateRegistration)
    Reject,
}

impl FromStr for DuplicatePolicy {
    type Err = ConfigValueError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "reject" => Ok(Self::Reject),
            _ => Err(ConfigValueError {
                variable: DUPLICATES_VAR,
                value: value.to_string(),
            }),
        }
    }
}

/// An environment variable held a value which could not be understood
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid value '{value}' for {variable}")]
pub struct ConfigValueError {
    pub variable: &'static str,
    pub value: String,
}

pub const AUTO_INITIALIZE_VAR: &str = "ADDLE_LOCATOR_AUTOINITIALIZE";
pub const DUPLICATES_VAR: &str = "ADDLE_LOCATOR_DUPLICATES";

/// Behaviour switches of a [`Locator`](crate::Locator)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorConfig {
    /// Whether `make` runs the zero-argument initialization after construction
    ///
    /// Services are always initialized before they are published.
    pub auto_initialize: bool,
    pub duplicates: DuplicatePolicy,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            auto_initialize: !cfg!(feature = "no-autoinitialize"),
            duplicates: DuplicatePolicy::default(),
        }
    }
}

impl LocatorConfig {
    /// Defaults, overridden by `ADDLE_LOCATOR_AUTOINITIALIZE` and `ADDLE_LOCATOR_DUPLICATES`
    pub fn from_env() -> Result<Self, ConfigValueError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigValueError> {
        let mut config = Self::default();

        if let Some(value) = lookup(AUTO_INITIALIZE_VAR) {
            config.auto_initialize = parse_flag(AUTO_INITIALIZE_VAR, &value)?;
        }
        if let Some(value) = lookup(DUPLICATES_VAR) {
            config.duplicates = value.parse()?;
        }

        tracing::debug!("Locator configuration: {config:?}");
        Ok(config)
    }

    pub fn auto_initialize(mut self, enabled: bool) -> Self {
        self.auto_initialize = enabled;
        self
    }

    pub fn duplicates(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicates = policy;
        self
    }
}

fn parse_flag(variable: &'static str, value: &str) -> Result<bool, ConfigValueError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigValueError {
            variable,
            value: value.to_string(),
        }),
    }
}
