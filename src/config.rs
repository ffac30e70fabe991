use crate::automaton::{InitStrategy, Rule};
use crate::cell::BIO_LEN;
use crate::season::Overrides;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub grid: GridConfig,
    pub run: RunConfig,
    #[serde(default)]
    pub init: InitStrategy,
    #[serde(default)]
    pub rule: Rule,
    #[serde(default)]
    pub overrides: Overrides,
}

/// Grid dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridConfig {
    pub height: usize,
    pub width: usize,
}

/// Run length and randomness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Number of weekly transitions.
    pub n_weeks: usize,
    /// Generator seed; drawn from the OS when absent.
    pub seed: Option<u64>,
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        check_num(self.grid.height, 1..=1000).context("invalid grid height")?;
        check_num(self.grid.width, 1..=1000).context("invalid grid width")?;
        check_num(self.run.n_weeks, 1..=10_000).context("invalid number of weeks")?;

        match self.init {
            InitStrategy::Clustered {
                cluster_size,
                cluster_spacing,
            } => {
                check_num(cluster_spacing, 1..).context("invalid cluster spacing")?;
                check_num(cluster_size, 0..=cluster_spacing).context("invalid cluster size")?;
            }
            InitStrategy::Random { prob } => {
                check_num(prob, 0.0..=1.0).context("invalid initial probability")?;
            }
            InitStrategy::CentralPatch { patch_size } => {
                check_num(patch_size, 1..).context("invalid patch size")?;
            }
            InitStrategy::Full | InitStrategy::SingleSeed => {}
        }

        let rule = &self.rule;
        check_num(rule.prob_germinate, 0.0..=1.0).context("invalid germination probability")?;
        check_num(rule.prob_establish, 0.0..=1.0).context("invalid establishment probability")?;
        check_num(rule.prob_death, 0.0..=1.0).context("invalid death probability")?;
        check_num(rule.prob_spread, 0.0..=1.0).context("invalid spread probability")?;
        check_num(rule.nitrogen_threshold, 0.0..).context("invalid nitrogen threshold")?;
        check_num(rule.phosphorus_threshold, 0.0..).context("invalid phosphorus threshold")?;
        check_num(rule.nitrogen_idx, 0..BIO_LEN).context("invalid nitrogen index")?;
        check_num(rule.phosphorus_idx, 0..BIO_LEN).context("invalid phosphorus index")?;

        self.overrides.validate().context("invalid overrides")?;

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
