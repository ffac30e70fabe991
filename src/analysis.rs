//! Coverage time series across runs.

use crate::cell::CellState;
use crate::snapshot::Snapshot;
use crate::stats::Accumulator;
use anyhow::{Context, Result};
use std::path::Path;

/// Scalar observable measured on every snapshot.
pub trait Obs {
    fn name(&self) -> &'static str;
    fn measure(&self, snapshot: &Snapshot) -> f64;
}

/// Fraction of cells in a given discrete state.
pub struct StateFraction {
    name: &'static str,
    state: CellState,
}

impl StateFraction {
    pub fn new(name: &'static str, state: CellState) -> Self {
        Self { name, state }
    }
}

impl Obs for StateFraction {
    fn name(&self) -> &'static str {
        self.name
    }

    fn measure(&self, snapshot: &Snapshot) -> f64 {
        snapshot.fraction(self.state)
    }
}

/// Accumulates observables per week over any number of runs.
pub struct Analyzer {
    obs_ptr_vec: Vec<Box<dyn Obs>>,
    /// Accumulators indexed by week, then by observable.
    acc_vec_vec: Vec<Vec<Accumulator>>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(StateFraction::new("seagrass", CellState::Seagrass)),
            Box::new(StateFraction::new("germinating", CellState::Germinating)),
        ];
        Self {
            obs_ptr_vec,
            acc_vec_vec: Vec::new(),
        }
    }

    pub fn add_snapshot(&mut self, snapshot: &Snapshot) {
        let n_obs = self.obs_ptr_vec.len();
        if self.acc_vec_vec.len() <= snapshot.week {
            self.acc_vec_vec
                .resize_with(snapshot.week + 1, || vec![Accumulator::new(); n_obs]);
        }
        let acc_vec = &mut self.acc_vec_vec[snapshot.week];
        for (obs, acc) in self.obs_ptr_vec.iter().zip(acc_vec.iter_mut()) {
            acc.add(obs.measure(snapshot));
        }
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let snapshot = Snapshot::load(file).with_context(|| format!("failed to load {file:?}"))?;
        self.add_snapshot(&snapshot);
        Ok(())
    }

    /// Write one CSV line per week with the number of runs and the mean and
    /// standard deviation of every observable.
    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let mut writer =
            csv::Writer::from_path(file).with_context(|| format!("failed to create {file:?}"))?;

        let mut header = vec!["week".to_string(), "n_runs".to_string()];
        for obs in &self.obs_ptr_vec {
            header.push(format!("{}_mean", obs.name()));
            header.push(format!("{}_std_dev", obs.name()));
        }
        writer.write_record(&header).context("failed to write header")?;

        for (week, acc_vec) in self.acc_vec_vec.iter().enumerate() {
            let n_runs = acc_vec.first().map_or(0, |acc| acc.n_vals());
            if n_runs == 0 {
                continue;
            }
            let mut record = vec![week.to_string(), n_runs.to_string()];
            for acc in acc_vec {
                let report = acc.report();
                record.push(report.mean.to_string());
                record.push(report.std_dev.to_string());
            }
            writer
                .write_record(&record)
                .with_context(|| format!("failed to write week {week}"))?;
        }

        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::BioVector;
    use std::{env, fs, process};

    fn snapshot(week: usize, presence: Vec<u8>) -> Snapshot {
        Snapshot {
            week,
            height: 1,
            width: presence.len(),
            bio: vec![BioVector::default(); presence.len()],
            presence,
        }
    }

    #[test]
    fn coverage_is_averaged_per_week() {
        let mut analyzer = Analyzer::new();
        analyzer.add_snapshot(&snapshot(0, vec![2, 2, 0, 0]));
        analyzer.add_snapshot(&snapshot(0, vec![2, 1, 1, 0]));
        analyzer.add_snapshot(&snapshot(1, vec![2, 2, 2, 2]));

        let week_0 = &analyzer.acc_vec_vec[0];
        assert_eq!(week_0[0].report().mean, 0.375);
        assert_eq!(week_0[1].report().mean, 0.25);
        assert_eq!(analyzer.acc_vec_vec[1][0].n_vals(), 1);

        let dir = env::temp_dir().join(format!("seagrass-analysis-{}", process::id()));
        fs::create_dir_all(&dir).unwrap();
        let file = dir.join("coverage.csv");
        analyzer.save_results(&file).unwrap();

        let contents = fs::read_to_string(&file).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(
            lines[0],
            "week,n_runs,seagrass_mean,seagrass_std_dev,germinating_mean,germinating_std_dev"
        );
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("0,2,0.375,"));
        assert_eq!(lines[2], "1,1,1,NaN,0,NaN");
    }
}
