use crate::automaton::Automaton;
use crate::cell::CellState;
use crate::config::Config;
use crate::season::{Season, SeasonalBundle};
use crate::snapshot::{Snapshot, write_presence_csv};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use std::path::{Path, PathBuf};

/// Simulation engine.
///
/// Holds the configuration, the automaton, and the random number generator,
/// and runs the weekly loop writing every snapshot to a run directory.
pub struct Engine {
    cfg: Config,
    automaton: Automaton,
    rng: ChaCha12Rng,
}

impl Engine {
    /// Create a new `Engine` with the given configuration and its initial grid.
    pub fn generate_initial_condition(cfg: Config) -> Result<Self> {
        let mut rng = match cfg.run.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng()?,
        };

        let season = Season::from_weeks(cfg.run.n_weeks);
        let bundle = SeasonalBundle::for_season(season).with_overrides(&cfg.overrides);
        log::info!("using {season:?} parameters");
        log::debug!("{bundle:#?}");

        let automaton = Automaton::new(
            cfg.grid.height,
            cfg.grid.width,
            &cfg.init,
            cfg.rule.clone(),
            &bundle,
            &mut rng,
        )?;

        Ok(Self {
            cfg,
            automaton,
            rng,
        })
    }

    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    /// Perform the simulation, saving the initial grid as week 0, a snapshot
    /// after every week and the final presence map.
    pub fn perform_simulation<P: AsRef<Path>>(&mut self, run_dir: P) -> Result<()> {
        let run_dir = run_dir.as_ref();

        self.save_snapshot(run_dir, 0)?;

        let n_weeks = self.cfg.run.n_weeks;
        for week in 1..=n_weeks {
            self.automaton
                .advance_week(week, &mut self.rng)
                .with_context(|| format!("failed to advance week {week}"))?;

            self.save_snapshot(run_dir, week)?;

            let grid = self.automaton.grid();
            let progress = 100.0 * week as f64 / n_weeks as f64;
            log::info!(
                "completed {progress:06.2}% (seagrass: {}, germinating: {}, empty: {})",
                grid.count(CellState::Seagrass),
                grid.count(CellState::Germinating),
                grid.count(CellState::Empty),
            );
        }

        let file = final_state_file(run_dir);
        write_presence_csv(&file, self.automaton.grid())
            .with_context(|| format!("failed to write {file:?}"))?;
        log::info!("wrote {file:?}");

        Ok(())
    }

    fn save_snapshot(&self, run_dir: &Path, week: usize) -> Result<()> {
        let file = snapshot_file(run_dir, week);
        Snapshot::from_grid(week, self.automaton.grid())
            .save(&file)
            .with_context(|| format!("failed to save {file:?}"))?;
        log::debug!("saved {file:?}");
        Ok(())
    }
}

pub fn snapshot_file(run_dir: &Path, week: usize) -> PathBuf {
    run_dir.join(format!("week-{week:04}.msgpack"))
}

pub fn final_state_file(run_dir: &Path) -> PathBuf {
    run_dir.join("final_state.csv")
}
