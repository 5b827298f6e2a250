use clap::ValueEnum;

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
/// Output format of the info command
pub enum InfoFormat {
    /// Pretty printed JSON
    Json,
    /// YAML
    Yaml,
}

impl AsRef<str> for InfoFormat {
    /// Returns the file extension of the format.
    fn as_ref(&self) -> &str {
        match self {
            InfoFormat::Json => "json",
            InfoFormat::Yaml => "yaml",
        }
    }
}

/// Options shared by all commands.
#[derive(Clone, Debug, Default)]
pub struct ExtraConfig {
    /// Format used by the info command
    pub info_format: Option<InfoFormat>,
    /// Unix time stamped into repacked banks, the current time if unset
    pub build_time: Option<u64>,
}

impl ExtraConfig {
    pub fn info_format(&self) -> InfoFormat {
        self.info_format.unwrap_or(InfoFormat::Json)
    }

    pub fn build_time(&self) -> anyhow::Result<Option<std::time::SystemTime>> {
        let Some(secs) = self.build_time else {
            return Ok(None);
        };
        std::time::UNIX_EPOCH
            .checked_add(std::time::Duration::from_secs(secs))
            .map(Some)
            .ok_or_else(|| anyhow::anyhow!("Build time {} is out of range", secs))
    }
}

/// Outcome of processing one file.
pub enum ProcessResult {
    Ok,
    Ignored,
}

#[test]
fn test_build_time() {
    let mut config = ExtraConfig::default();
    assert!(config.build_time().unwrap().is_none());
    config.build_time = Some(1_000_000_000);
    assert_eq!(
        config.build_time().unwrap(),
        Some(std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000_000))
    );
    config.build_time = Some(u64::MAX);
    assert!(config.build_time().is_err());
}
