use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml(&raw)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if no endpoint is configured or an endpoint or
    /// relay setting is out of range
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_has_endpoints()?;
        self.validate_endpoints()?;
        self.validate_relay()?;
        Ok(())
    }

    fn validate_has_endpoints(&self) -> anyhow::Result<()> {
        if self.endpoints.is_empty() {
            anyhow::bail!("at least one endpoint must be configured under [endpoints]");
        }
        Ok(())
    }

    fn validate_endpoints(&self) -> anyhow::Result<()> {
        for (id, endpoint) in &self.endpoints {
            if endpoint.model.trim().is_empty() {
                anyhow::bail!("endpoint '{id}' must name a model");
            }

            if let Some(temperature) = endpoint.temperature
                && !(0.0..=2.0).contains(&temperature)
            {
                anyhow::bail!("endpoint '{id}' temperature {temperature} is outside 0.0..=2.0");
            }
        }
        Ok(())
    }

    fn validate_relay(&self) -> anyhow::Result<()> {
        if self.relay.simulated_chunk_chars == 0 {
            anyhow::bail!("relay.simulated_chunk_chars must be greater than 0");
        }
        if self.relay.request_timeout.is_zero() {
            anyhow::bail!("relay.request_timeout must be greater than 0");
        }
        Ok(())
    }
}
