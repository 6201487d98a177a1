//! `colloquy doctor` — Diagnose configuration and provider health.

use colloquy_config::AppConfig;
use colloquy_core::provider::Provider;
use colloquy_providers::OpenAiCompatProvider;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("Colloquy Doctor — System Diagnostics");
    println!("====================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ✅ Config file found");
    } else {
        println!("  ⚠️  No config file — run `colloquy onboard` (defaults in effect)");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            Some(config)
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            issues += 1;
            None
        }
    };

    if let Some(config) = config {
        match &config.api_key {
            Some(api_key) => {
                println!("  ✅ API key configured");

                let provider = OpenAiCompatProvider::new(
                    "openai",
                    &config.provider.base_url,
                    api_key,
                    std::time::Duration::from_secs(config.provider.timeout_secs),
                )?;
                match provider.health_check().await {
                    Ok(true) => println!("  ✅ Provider reachable ({})", config.provider.base_url),
                    Ok(false) | Err(_) => {
                        println!("  ❌ Provider unreachable ({})", config.provider.base_url);
                        issues += 1;
                    }
                }
            }
            None => {
                println!("  ⚠️  No API key — set COLLOQUY_API_KEY or add api_key to config.toml");
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
