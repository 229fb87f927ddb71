use crate::config::{ConfigResult, HarnessConfig, ScenarioRate};
use clap::Parser;
use std::path::PathBuf;

/// Command-line flags. Each overrides the matching [`HarnessConfig`] field.
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "player-harness",
    about = "Drive a game backend with a population of simulated players",
    version
)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, short, env = "HARNESS_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "GATEWAY_URL")]
    pub gateway_url: Option<String>,

    /// Address of the Prometheus `/metrics` endpoint.
    #[arg(long, env = "HARNESS_METRICS_ADDR")]
    pub metrics_addr: Option<String>,

    #[arg(long, env = "HARNESS_TARGET_PLAYERS")]
    pub target_players: Option<usize>,

    #[arg(long)]
    pub creation_interval_ms: Option<u64>,

    #[arg(long)]
    pub tick_interval_ms: Option<u64>,

    #[arg(long)]
    pub dispatch_deadline_ms: Option<u64>,

    #[arg(long)]
    pub shutdown_grace_ms: Option<u64>,

    /// Replace the scenario mix, e.g. `--rate matchmaking=0.1 --rate fetch_store=0.05`.
    #[arg(long = "rate", value_parser = parse_rate)]
    pub rates: Vec<ScenarioRate>,
}

fn parse_rate(raw: &str) -> Result<ScenarioRate, String> {
    let (scenario, rate) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SCENARIO=RATE, got `{raw}`"))?;
    let rate: f64 = rate
        .trim()
        .parse()
        .map_err(|e| format!("bad rate in `{raw}`: {e}"))?;
    Ok(ScenarioRate::new(scenario.trim(), rate))
}

impl Cli {
    /// Load the file (or defaults), apply flag overrides, then validate.
    pub fn resolve(&self) -> ConfigResult<HarnessConfig> {
        let mut config = HarnessConfig::load(self.config.as_deref())?;
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&self, config: &mut HarnessConfig) {
        if let Some(url) = &self.gateway_url {
            config.gateway_url = url.clone();
        }
        if let Some(addr) = &self.metrics_addr {
            config.metrics_addr = addr.clone();
        }
        if let Some(n) = self.target_players {
            config.target_players = n;
        }
        if let Some(ms) = self.creation_interval_ms {
            config.creation_interval_ms = ms;
        }
        if let Some(ms) = self.tick_interval_ms {
            config.tick_interval_ms = ms;
        }
        if let Some(ms) = self.dispatch_deadline_ms {
            config.dispatch_deadline_ms = ms;
        }
        if let Some(ms) = self.shutdown_grace_ms {
            config.shutdown_grace_ms = ms;
        }
        if !self.rates.is_empty() {
            config.scenarios = self.rates.clone();
        }
    }
}
