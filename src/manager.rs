use crate::analysis::Analyzer;
use crate::config::Config;
use crate::engine::Engine;
use anyhow::{Context, Result, bail};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Simulation directory holding `config.toml`, one `run-NNNN` directory
/// per run and the coverage table.
pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Run a new simulation in the next free run directory.
    pub fn create_run(&self) -> Result<()> {
        let run_idx = self.run_dirs().context("failed to list run dirs")?.len();

        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let mut engine = Engine::generate_initial_condition(self.cfg.clone())
            .context("failed to generate initial condition")?;

        engine
            .perform_simulation(&run_dir)
            .context("failed to perform simulation")?;

        Ok(())
    }

    /// Aggregate the snapshots of every run into the coverage table.
    pub fn analyze_sim(&self) -> Result<()> {
        let run_dirs = self.run_dirs().context("failed to list run dirs")?;
        if run_dirs.is_empty() {
            bail!("no runs to analyze in {:?}", self.sim_dir);
        }

        let mut analyzer = Analyzer::new();
        for run_dir in &run_dirs {
            let files = list_paths(&run_dir.join("week-*.msgpack"))
                .context("failed to list snapshot files")?;
            log::debug!("analyzing {} snapshots in {run_dir:?}", files.len());
            for file in files {
                analyzer.add_file(&file).context("failed to add file")?;
            }
        }

        let file = self.coverage_file();
        analyzer
            .save_results(&file)
            .context("failed to save results")?;
        log::info!("analyzed {} runs into {file:?}", run_dirs.len());

        Ok(())
    }

    /// Remove every run directory and the coverage table.
    pub fn clean_sim(&self) -> Result<()> {
        for run_dir in self.run_dirs().context("failed to list run dirs")? {
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }

        let file = self.coverage_file();
        if file.exists() {
            fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
            log::info!("removed {file:?}");
        }

        Ok(())
    }

    fn run_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = list_paths(&self.sim_dir.join("run-*"))?;
        dirs.retain(|path| path.is_dir());
        Ok(dirs)
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn coverage_file(&self) -> PathBuf {
        self.sim_dir.join("coverage.csv")
    }
}

/// Sorted paths matching a glob pattern.
fn list_paths(pattern: &Path) -> Result<Vec<PathBuf>> {
    let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
    let mut paths: Vec<_> = glob(pattern)
        .context("failed to glob pattern")?
        .filter_map(Result::ok)
        .collect();
    paths.sort();
    Ok(paths)
}
