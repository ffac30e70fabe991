//! Seabed grid, initialization strategies and the weekly transition rule.

use crate::cell::{BioVector, CellState, CellStepper, NO3_IDX, SRP_IDX};
use crate::season::SeasonalBundle;
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_distr::Bernoulli;
use serde::{Deserialize, Serialize};

/// Daily biogeochemical sub-steps per weekly transition.
pub const DAYS_PER_WEEK: usize = 7;

/// Grid of cells stored in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    height: usize,
    width: usize,
    states: Vec<CellState>,
    bio: Vec<BioVector>,
}

impl Grid {
    /// Create an empty grid with all-zero vectors.
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            states: vec![CellState::Empty; height * width],
            bio: vec![BioVector::default(); height * width],
        }
    }

    /// Build a grid from explicit states and vectors, validating both.
    pub fn from_parts(
        height: usize,
        width: usize,
        states: Vec<CellState>,
        bio: Vec<BioVector>,
    ) -> Result<Self> {
        let n_cells = height * width;
        if states.len() != n_cells {
            bail!("expected {n_cells} states, but got {}", states.len());
        }
        if bio.len() != n_cells {
            bail!("expected {n_cells} vectors, but got {}", bio.len());
        }
        for (idx, vec) in bio.iter().enumerate() {
            let pos = (idx / width, idx % width);
            BioVector::try_from(&vec.0[..])
                .with_context(|| format!("invalid vector at cell {pos:?}"))?;
        }
        Ok(Self {
            height,
            width,
            states,
            bio,
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn state(&self, row: usize, col: usize) -> CellState {
        self.states[row * self.width + col]
    }

    pub fn bio(&self, row: usize, col: usize) -> &BioVector {
        &self.bio[row * self.width + col]
    }

    pub fn states(&self) -> &[CellState] {
        &self.states
    }

    pub fn bio_vectors(&self) -> &[BioVector] {
        &self.bio
    }

    /// Presence map in row-major order (0 empty, 1 germinating, 2 seagrass).
    pub fn presence(&self) -> Vec<u8> {
        self.states.iter().map(|state| state.presence()).collect()
    }

    pub fn count(&self, state: CellState) -> usize {
        self.states.iter().filter(|&&s| s == state).count()
    }

    /// Row-major indices of the in-bounds Moore neighbors of a cell.
    fn neighbors(&self, row: usize, col: usize) -> impl Iterator<Item = usize> + '_ {
        let rows = row.saturating_sub(1)..=(row + 1).min(self.height - 1);
        rows.flat_map(move |nr| {
            let cols = col.saturating_sub(1)..=(col + 1).min(self.width - 1);
            cols.filter(move |&nc| (nr, nc) != (row, col))
                .map(move |nc| nr * self.width + nc)
        })
    }
}

/// Initial arrangement of the discrete states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InitStrategy {
    /// Square clusters on a checkerboard of `cluster_spacing` tiles.
    Clustered {
        #[serde(default = "default_cluster_size")]
        cluster_size: usize,
        #[serde(default = "default_cluster_spacing")]
        cluster_spacing: usize,
    },
    /// Each cell germinates independently with probability `prob`.
    Random {
        #[serde(default = "default_random_prob")]
        prob: f64,
    },
    /// Seagrass square of side `patch_size` at the grid center.
    CentralPatch {
        #[serde(default = "default_patch_size")]
        patch_size: usize,
    },
    /// Seagrass everywhere.
    Full,
    /// One seagrass cell at the grid center.
    SingleSeed,
}

fn default_cluster_size() -> usize {
    5
}

fn default_cluster_spacing() -> usize {
    10
}

fn default_random_prob() -> f64 {
    0.5
}

fn default_patch_size() -> usize {
    20
}

impl Default for InitStrategy {
    fn default() -> Self {
        InitStrategy::Clustered {
            cluster_size: default_cluster_size(),
            cluster_spacing: default_cluster_spacing(),
        }
    }
}

impl InitStrategy {
    /// Discrete states for a `height x width` grid in row-major order.
    pub fn initial_states<R: Rng>(
        &self,
        height: usize,
        width: usize,
        rng: &mut R,
    ) -> Result<Vec<CellState>> {
        let mut states = vec![CellState::Empty; height * width];
        match *self {
            InitStrategy::Clustered {
                cluster_size,
                cluster_spacing,
            } => {
                for row in 0..height {
                    for col in 0..width {
                        let same_phase =
                            (row / cluster_spacing) % 2 == (col / cluster_spacing) % 2;
                        let in_tile = row % cluster_spacing < cluster_size
                            && col % cluster_spacing < cluster_size;
                        if same_phase && in_tile {
                            states[row * width + col] = CellState::Seagrass;
                        }
                    }
                }
            }
            InitStrategy::Random { prob } => {
                let dist = Bernoulli::new(prob)?;
                for state in states.iter_mut() {
                    if dist.sample(rng) {
                        *state = CellState::Germinating;
                    }
                }
            }
            InitStrategy::CentralPatch { patch_size } => {
                let row_start = height.saturating_sub(patch_size) / 2;
                let col_start = width.saturating_sub(patch_size) / 2;
                for row in row_start..(row_start + patch_size).min(height) {
                    for col in col_start..(col_start + patch_size).min(width) {
                        states[row * width + col] = CellState::Seagrass;
                    }
                }
            }
            InitStrategy::Full => states.fill(CellState::Seagrass),
            InitStrategy::SingleSeed => {
                states[(height / 2) * width + width / 2] = CellState::Seagrass;
            }
        }
        Ok(states)
    }
}

/// How the weekly pass exposes its own writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    /// Every decision reads the states from the start of the week.
    #[default]
    Buffered,
    /// Cells are updated in row-major order and later cells see earlier writes.
    InPlace,
}

/// Parameters of the discrete transition rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Rule {
    /// Empty to germinating, when nutrients allow.
    pub prob_germinate: f64,
    /// Germinating to seagrass.
    pub prob_establish: f64,
    /// Seagrass to empty.
    pub prob_death: f64,
    /// Seagrass seeding an empty neighbor.
    pub prob_spread: f64,

    pub nitrogen_threshold: f64,
    pub phosphorus_threshold: f64,
    /// Vector component compared with `nitrogen_threshold`.
    pub nitrogen_idx: usize,
    /// Vector component compared with `phosphorus_threshold`.
    pub phosphorus_idx: usize,

    pub update: UpdatePolicy,
}

impl Default for Rule {
    fn default() -> Self {
        Self {
            prob_germinate: 0.1,
            prob_establish: 0.1,
            prob_death: 0.1,
            prob_spread: 0.2,
            nitrogen_threshold: 0.3,
            phosphorus_threshold: 0.3,
            nitrogen_idx: NO3_IDX,
            phosphorus_idx: SRP_IDX,
            update: UpdatePolicy::default(),
        }
    }
}

struct RuleDists {
    germinate: Bernoulli,
    establish: Bernoulli,
    death: Bernoulli,
    spread: Bernoulli,
}

impl RuleDists {
    fn new(rule: &Rule) -> Result<Self> {
        Ok(Self {
            germinate: Bernoulli::new(rule.prob_germinate)?,
            establish: Bernoulli::new(rule.prob_establish)?,
            death: Bernoulli::new(rule.prob_death)?,
            spread: Bernoulli::new(rule.prob_spread)?,
        })
    }
}

/// Grid driver coupling the cell pipeline with the transition rule.
pub struct Automaton {
    grid: Grid,
    rule: Rule,
    stepper: CellStepper,
}

impl Automaton {
    /// Lay out the initial states and populate every occupied cell.
    pub fn new<R: Rng>(
        height: usize,
        width: usize,
        init: &InitStrategy,
        rule: Rule,
        bundle: &SeasonalBundle,
        rng: &mut R,
    ) -> Result<Self> {
        let states = init
            .initial_states(height, width, rng)
            .context("failed to lay out initial states")?;
        let grid = Grid {
            height,
            width,
            states,
            bio: vec![BioVector::default(); height * width],
        };
        Self::from_grid(grid, rule, bundle)
    }

    /// Wrap an existing grid, populating occupied cells that have no vector.
    pub fn from_grid(grid: Grid, rule: Rule, bundle: &SeasonalBundle) -> Result<Self> {
        let mut automaton = Self {
            grid,
            rule,
            stepper: CellStepper::new(bundle),
        };
        let n_new = automaton.populate().context("failed to populate initial cells")?;
        log::debug!("populated {n_new} initial cells");
        Ok(automaton)
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Run one weekly cycle: daily biogeochemistry for every cell, then the
    /// discrete transition rule, then population of newly occupied cells.
    pub fn advance_week<R: Rng>(&mut self, week: usize, rng: &mut R) -> Result<()> {
        self.step_days(week)?;

        let dists = RuleDists::new(&self.rule).context("invalid transition probabilities")?;
        match self.rule.update {
            UpdatePolicy::Buffered => self.transition_buffered(&dists, rng),
            UpdatePolicy::InPlace => self.transition_in_place(&dists, rng),
        }

        let n_new = self
            .populate()
            .with_context(|| format!("failed to populate new cells in week {week}"))?;
        log::debug!("week {week}: populated {n_new} new cells");

        Ok(())
    }

    fn step_days(&mut self, week: usize) -> Result<()> {
        let width = self.grid.width;
        for day in 1..=DAYS_PER_WEEK {
            for (idx, bio) in self.grid.bio.iter_mut().enumerate() {
                *bio = self.stepper.step(day, bio).with_context(|| {
                    format!(
                        "failed to step cell {:?} on day {day} of week {week}",
                        (idx / width, idx % width)
                    )
                })?;
            }
        }
        Ok(())
    }

    /// Populate occupied cells whose vector is still all-zero.
    fn populate(&mut self) -> Result<usize> {
        let width = self.grid.width;
        let mut n_new = 0;
        let cells = self.grid.states.iter().zip(self.grid.bio.iter_mut());
        for (idx, (state, bio)) in cells.enumerate() {
            if *state != CellState::Empty && bio.is_zero() {
                let pos = (idx / width, idx % width);
                *bio = self
                    .stepper
                    .step(0, bio)
                    .with_context(|| format!("failed to populate cell {pos:?}"))?;
                n_new += 1;
            }
        }
        Ok(n_new)
    }

    /// Next state of a single cell, ignoring spread.
    fn next_state<R: Rng>(
        &self,
        state: CellState,
        bio: &BioVector,
        dists: &RuleDists,
        rng: &mut R,
    ) -> CellState {
        let rule = &self.rule;
        match state {
            CellState::Empty => {
                if !bio.is_zero()
                    && dists.germinate.sample(rng)
                    && bio.get(rule.nitrogen_idx) > rule.nitrogen_threshold
                    && bio.get(rule.phosphorus_idx) > rule.phosphorus_threshold
                {
                    CellState::Germinating
                } else {
                    CellState::Empty
                }
            }
            CellState::Germinating => {
                if dists.establish.sample(rng) {
                    CellState::Seagrass
                } else {
                    CellState::Germinating
                }
            }
            CellState::Seagrass => {
                if dists.death.sample(rng) {
                    CellState::Empty
                } else {
                    CellState::Seagrass
                }
            }
        }
    }

    fn transition_buffered<R: Rng>(&mut self, dists: &RuleDists, rng: &mut R) {
        let prev = self.grid.states.clone();

        let mut next: Vec<_> = prev
            .iter()
            .zip(&self.grid.bio)
            .map(|(&state, bio)| self.next_state(state, bio, dists, rng))
            .collect();

        for (idx, &state) in prev.iter().enumerate() {
            if state != CellState::Seagrass {
                continue;
            }
            let (row, col) = (idx / self.grid.width, idx % self.grid.width);
            for n_idx in self.grid.neighbors(row, col) {
                if prev[n_idx] == CellState::Empty && dists.spread.sample(rng) {
                    next[n_idx] = CellState::Germinating;
                }
            }
        }

        self.grid.states = next;
    }

    fn transition_in_place<R: Rng>(&mut self, dists: &RuleDists, rng: &mut R) {
        for idx in 0..self.grid.states.len() {
            let state = self.next_state(self.grid.states[idx], &self.grid.bio[idx], dists, rng);
            self.grid.states[idx] = state;
            if state != CellState::Seagrass {
                continue;
            }
            let (row, col) = (idx / self.grid.width, idx % self.grid.width);
            let neighbors: Vec<_> = self.grid.neighbors(row, col).collect();
            for n_idx in neighbors {
                if self.grid.states[n_idx] == CellState::Empty && dists.spread.sample(rng) {
                    self.grid.states[n_idx] = CellState::Germinating;
                }
            }
        }
    }
}
