use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// [`Config::default`] yields the reference parameter set; a TOML file can
/// replace it wholesale. See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    pub init: InitConfig,
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
pub struct ModelConfig {
    /// Side length of the toroidal grid.
    pub grid_side: u16,

    /// Mean of the exponential E→I dwell time (days).
    pub mean_dwell_exp: f64,
    /// Mean of the exponential I→R dwell time (days).
    pub mean_dwell_inf: f64,
    /// Mean of the exponential R→S dwell time (days).
    pub mean_dwell_rem: f64,

    /// A susceptible agent under infection pressure `n` turns exposed with
    /// probability `1 - exp(-inf_force * n)`.
    pub inf_force: f64,
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
pub struct InitConfig {
    /// Population size, fixed for the whole run.
    pub n_agents: usize,

    /// Initial compartment counts; must sum to `n_agents`.
    pub n_susceptible: usize,
    pub n_exposed: usize,
    pub n_infectious: usize,
    pub n_removed: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelConfig {
                grid_side: 300,
                mean_dwell_exp: 3.0,
                mean_dwell_inf: 7.0,
                mean_dwell_rem: 365.0,
                inf_force: 0.5,
            },
            init: InitConfig {
                n_agents: 20_000,
                n_susceptible: 19_980,
                n_exposed: 0,
                n_infectious: 20,
                n_removed: 0,
            },
        }
    }
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized, or if the
    /// configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        check_num(self.model.grid_side, 1..10_000).context("invalid grid side")?;

        check_mean(self.model.mean_dwell_exp).context("invalid mean E→I dwell time")?;
        check_mean(self.model.mean_dwell_inf).context("invalid mean I→R dwell time")?;
        check_mean(self.model.mean_dwell_rem).context("invalid mean R→S dwell time")?;

        check_num(self.model.inf_force, 0.0..f64::INFINITY).context("invalid infection force")?;

        check_num(self.init.n_agents, 1..10_000_000).context("invalid number of agents")?;

        let sum = self.init.n_susceptible
            + self.init.n_exposed
            + self.init.n_infectious
            + self.init.n_removed;
        if sum != self.init.n_agents {
            bail!(
                "initial compartment counts must sum to the number of agents ({}), but sum to {sum}",
                self.init.n_agents
            );
        }

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_mean(mean: f64) -> Result<()> {
    if !(mean.is_finite() && mean > 0.0) {
        bail!("mean dwell time must be a positive finite number of days, but is {mean}");
    }
    Ok(())
}
