/*!
 * Cirrus Init Command - configuration file wizard
 *
 * Asks for the cloud endpoint and a usage profile, then writes
 * ~/.cirrus/cirrus.toml (or the path given on the command line).
 * Credentials are not part of this file; `cirrus setup` handles those.
 */

use crate::config::{CloudConfig, DEFAULT_API_BASE_URL};
use anyhow::Result;
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use std::path::Path;

/// Usage profiles offered by the wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupProfile {
    /// Throttle on, one retry
    Standard,
    /// Frequent polling of a few variables: short throttle window
    Polling,
    /// Flaky uplink: longer timeouts, more retries
    Unreliable,
}

impl SetupProfile {
    const ALL: [SetupProfile; 3] = [
        SetupProfile::Standard,
        SetupProfile::Polling,
        SetupProfile::Unreliable,
    ];

    fn label(&self) -> &'static str {
        match self {
            SetupProfile::Standard => "Standard (10s throttle, 1 retry)",
            SetupProfile::Polling => "Polling (2s throttle, larger endpoint cache)",
            SetupProfile::Unreliable => "Unreliable network (longer timeouts, 3 retries)",
        }
    }

    /// Configuration for this profile against `api_base_url`
    pub fn build_config(&self, api_base_url: String) -> CloudConfig {
        let base = CloudConfig {
            api_base_url,
            ..Default::default()
        };
        match self {
            SetupProfile::Standard => base,
            SetupProfile::Polling => CloudConfig {
                throttle_window_secs: 2,
                throttle_cache_size: 32,
                ..base
            },
            SetupProfile::Unreliable => CloudConfig {
                http_timeout_ms: 15_000,
                connect_timeout_ms: 6_000,
                function_retry_count: 3,
                function_retry_delay_ms: 1_500,
                ..base
            },
        }
    }
}

/// Run the interactive initialization wizard
pub fn run_init_wizard(config_path: &Path) -> Result<()> {
    print_welcome();
    let theme = ColorfulTheme::default();

    if config_path.exists()
        && !Confirm::with_theme(&theme)
            .with_prompt("Existing configuration found. Overwrite?")
            .default(false)
            .interact()?
    {
        println!("\n{}", style("Configuration unchanged.").cyan());
        return Ok(());
    }

    let api_base_url: String = Input::with_theme(&theme)
        .with_prompt("Device cloud API URL")
        .default(DEFAULT_API_BASE_URL.to_string())
        .validate_with(|input: &String| -> std::result::Result<(), String> {
            url::Url::parse(input)
                .map(|_| ())
                .map_err(|e| format!("not a URL: {}", e))
        })
        .interact_text()?;

    let labels: Vec<&str> = SetupProfile::ALL.iter().map(|p| p.label()).collect();
    let selection = Select::with_theme(&theme)
        .with_prompt("How will this client be used?")
        .default(0)
        .items(&labels[..])
        .interact()?;

    let mut config = SetupProfile::ALL[selection].build_config(api_base_url);
    config.accept_invalid_certs = Confirm::with_theme(&theme)
        .with_prompt("Accept invalid TLS certificates (self-hosted test clouds only)?")
        .default(false)
        .interact()?;

    config.to_file(config_path)?;
    print_summary(config_path, &config);
    Ok(())
}

/// Write the default configuration without asking anything
pub fn write_default_config(config_path: &Path) -> Result<CloudConfig> {
    let config = CloudConfig::default();
    config.to_file(config_path)?;
    print_summary(config_path, &config);
    Ok(config)
}

fn print_welcome() {
    println!();
    println!("{}", style("=== Cirrus Setup ===").cyan().bold());
    println!();
    println!("This wizard creates the client configuration file.");
}

fn print_summary(config_path: &Path, config: &CloudConfig) {
    println!();
    println!("{}", style("Configuration saved").green().bold());
    println!();
    println!("  Location: {}", style(config_path.display()).cyan());
    println!();
    println!("  {}", style("Configuration Summary:").bold());
    println!("  ─────────────────────────");
    println!("  API URL:          {}", style(&config.api_base_url).yellow());
    println!(
        "  Timeouts:         {} ms connect / {} ms response",
        style(config.connect_timeout_ms).yellow(),
        style(config.http_timeout_ms).yellow()
    );
    println!(
        "  Function retries: {} (every {} ms)",
        style(config.function_retry_count).yellow(),
        style(config.function_retry_delay_ms).yellow()
    );
    println!(
        "  Throttle:         {}",
        style(if config.throttle_enabled {
            format!(
                "{}s window, {} endpoints",
                config.throttle_window_secs, config.throttle_cache_size
            )
        } else {
            "disabled".to_string()
        })
        .yellow()
    );
    println!();
    println!("  {}", style("Next Steps:").bold());
    println!("  1. Run 'cirrus setup' to enter the API key and device ID");
    println!("  2. Run 'cirrus --help' to see available commands");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_standard_profile_is_default() {
        let config = SetupProfile::Standard.build_config(DEFAULT_API_BASE_URL.to_string());
        assert_eq!(config, CloudConfig::default());
    }

    #[test]
    fn test_polling_profile() {
        let config = SetupProfile::Polling.build_config("https://cloud.test".to_string());
        assert_eq!(config.api_base_url, "https://cloud.test");
        assert_eq!(config.throttle_window_secs, 2);
        assert!(config.throttle_enabled);
    }

    #[test]
    fn test_unreliable_profile() {
        let config = SetupProfile::Unreliable.build_config(DEFAULT_API_BASE_URL.to_string());
        assert_eq!(config.function_retry_count, 3);
        assert!(config.http_timeout_ms > CloudConfig::default().http_timeout_ms);
    }

    #[test]
    fn test_write_default_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cirrus.toml");
        let written = write_default_config(&path).unwrap();
        assert_eq!(CloudConfig::from_file(&path).unwrap(), written);
    }
}
