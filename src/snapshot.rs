use crate::automaton::Grid;
use crate::cell::{BioVector, CellState};
use anyhow::{Context, Result, bail};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Grid contents after a weekly transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub week: usize,
    pub height: usize,
    pub width: usize,
    /// Row-major cell vectors.
    pub bio: Vec<BioVector>,
    /// Row-major presence codes.
    pub presence: Vec<u8>,
}

impl Snapshot {
    pub fn from_grid(week: usize, grid: &Grid) -> Self {
        Self {
            week,
            height: grid.height(),
            width: grid.width(),
            bio: grid.bio_vectors().to_vec(),
            presence: grid.presence(),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, self).context("failed to serialize snapshot")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    /// Load a snapshot and check its dimensions, presence codes and vectors.
    pub fn load<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let snapshot: Snapshot =
            decode::from_read(&mut reader).context("failed to deserialize snapshot")?;
        snapshot.validate().context("failed to validate snapshot")?;
        Ok(snapshot)
    }

    fn validate(&self) -> Result<()> {
        let n_cells = self.height * self.width;
        if n_cells == 0 {
            bail!("grid must not be empty");
        }
        if self.bio.len() != n_cells {
            bail!("expected {n_cells} vectors, but got {}", self.bio.len());
        }
        if self.presence.len() != n_cells {
            bail!("expected {n_cells} presence codes, but got {}", self.presence.len());
        }
        if let Some(code) = self.presence.iter().find(|&&code| code > 2) {
            bail!("presence codes must be 0, 1 or 2, but got {code}");
        }
        for (idx, vec) in self.bio.iter().enumerate() {
            let pos = (idx / self.width, idx % self.width);
            BioVector::try_from(&vec.0[..])
                .with_context(|| format!("invalid vector at cell {pos:?}"))?;
        }
        Ok(())
    }

    /// Rebuild the grid, rejecting malformed vectors.
    pub fn to_grid(&self) -> Result<Grid> {
        let states = self
            .presence
            .iter()
            .map(|&code| match code {
                0 => CellState::Empty,
                1 => CellState::Germinating,
                _ => CellState::Seagrass,
            })
            .collect();
        Grid::from_parts(self.height, self.width, states, self.bio.clone())
    }

    /// Fraction of cells with the given presence code.
    pub fn fraction(&self, state: CellState) -> f64 {
        let code = state.presence();
        let count = self.presence.iter().filter(|&&c| c == code).count();
        count as f64 / self.presence.len() as f64
    }
}

/// Write a presence map as a headerless CSV with one line per grid row.
pub fn write_presence_csv<P: AsRef<Path>>(file: P, grid: &Grid) -> Result<()> {
    let file = file.as_ref();
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(file)
        .with_context(|| format!("failed to create {file:?}"))?;

    let presence = grid.presence();
    for row in presence.chunks(grid.width()) {
        writer
            .write_record(row.iter().map(|code| code.to_string()))
            .context("failed to write presence row")?;
    }
    writer.flush().context("failed to flush writer stream")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{BIO_LEN, NO3_IDX};
    use std::{env, fs, process};

    fn test_dir(name: &str) -> std::path::PathBuf {
        let dir = env::temp_dir().join(format!("seagrass-snapshot-{}-{name}", process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_grid() -> Grid {
        let states = vec![
            CellState::Seagrass,
            CellState::Empty,
            CellState::Germinating,
            CellState::Empty,
            CellState::Empty,
            CellState::Seagrass,
        ];
        let mut bio = vec![BioVector::default(); 6];
        bio[0] = BioVector([0.1 + 0.2, 1e-300, 3.5, 0.05, 0.01, 0.22, 0.23, 0.12, 0.02, 0.02]);
        bio[2] = BioVector([std::f64::consts::PI; BIO_LEN]);
        Grid::from_parts(2, 3, states, bio).unwrap()
    }

    #[test]
    fn snapshot_file_preserves_values_exactly() {
        let file = test_dir("exact").join("week-0003.msgpack");
        let grid = sample_grid();
        let snapshot = Snapshot::from_grid(3, &grid);
        snapshot.save(&file).unwrap();

        let loaded = Snapshot::load(&file).unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.presence, vec![2, 0, 1, 0, 0, 2]);
        assert_eq!(loaded.to_grid().unwrap(), grid);
        assert_eq!(loaded.fraction(CellState::Seagrass), 2.0 / 6.0);
    }

    #[test]
    fn inconsistent_snapshots_are_rejected() {
        let dir = test_dir("invalid");
        let mut snapshot = Snapshot::from_grid(0, &sample_grid());
        snapshot.presence.pop();
        snapshot.save(dir.join("short.msgpack")).unwrap();
        assert!(Snapshot::load(dir.join("short.msgpack")).is_err());

        let mut snapshot = Snapshot::from_grid(0, &sample_grid());
        snapshot.bio[1].0[NO3_IDX] = -0.5;
        assert!(snapshot.to_grid().is_err());
        snapshot.save(dir.join("negative.msgpack")).unwrap();
        let err = Snapshot::load(dir.join("negative.msgpack")).unwrap_err();
        assert!(format!("{err:#}").contains("(0, 1)"));

        let mut snapshot = Snapshot::from_grid(0, &sample_grid());
        snapshot.bio[4].0[0] = f64::NAN;
        snapshot.save(dir.join("nan.msgpack")).unwrap();
        assert!(Snapshot::load(dir.join("nan.msgpack")).is_err());
    }

    #[test]
    fn presence_csv_has_one_line_per_row() {
        let file = test_dir("csv").join("final_state.csv");
        write_presence_csv(&file, &sample_grid()).unwrap();
        let contents = fs::read_to_string(&file).unwrap();
        assert_eq!(contents, "2,0,1\n0,0,2\n");
    }
}
