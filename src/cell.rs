//! Per-cell state and the one-step biogeochemical pipeline.

use crate::growth::{GrowthModel, GrowthParams, GrowthState};
use crate::nitrogen::{NitrogenCycleModel, NitrogenParams, NitrogenState};
use crate::phosphorus::{PhosphorusCycleModel, PhosphorusParams, PhosphorusState};
use crate::season::SeasonalBundle;
use crate::solver::Solver;
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Number of biogeochemical components per cell.
pub const BIO_LEN: usize = 10;

pub const R_IDX: usize = 0;
pub const NRINT_IDX: usize = 1;
pub const N_ORG_IDX: usize = 2;
pub const NH4_IDX: usize = 3;
pub const NO2_IDX: usize = 4;
pub const NO3_IDX: usize = 5;
pub const POP_IDX: usize = 6;
pub const SRP_IDX: usize = 7;
pub const P_MA_INT_IDX: usize = 8;
pub const P_R_INT_IDX: usize = 9;

/// Discrete state of a seabed cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellState {
    #[default]
    Empty,
    Germinating,
    Seagrass,
}

impl CellState {
    /// Presence map code: 0 empty, 1 germinating, 2 seagrass.
    pub fn presence(self) -> u8 {
        match self {
            CellState::Empty => 0,
            CellState::Germinating => 1,
            CellState::Seagrass => 2,
        }
    }
}

/// Biogeochemical state of a cell:
/// `(R, Nrint, N_org, NH4, NO2, NO3, POP, SRP, P_ma_int, P_R_int)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BioVector(pub [f64; BIO_LEN]);

impl BioVector {
    /// An all-zero vector marks an inactive cell.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&val| val == 0.0)
    }

    pub fn get(&self, idx: usize) -> f64 {
        self.0[idx]
    }

    fn growth(&self) -> GrowthState {
        GrowthState {
            r: self.0[R_IDX],
            nrint: self.0[NRINT_IDX],
        }
    }

    fn nitrogen(&self) -> NitrogenState {
        NitrogenState {
            n_org: self.0[N_ORG_IDX],
            nh4: self.0[NH4_IDX],
            no2: self.0[NO2_IDX],
            no3: self.0[NO3_IDX],
        }
    }

    fn phosphorus(&self) -> PhosphorusState {
        PhosphorusState {
            pop: self.0[POP_IDX],
            srp: self.0[SRP_IDX],
            p_ma_int: self.0[P_MA_INT_IDX],
            p_r_int: self.0[P_R_INT_IDX],
        }
    }

    fn from_parts(g: GrowthState, n: NitrogenState, p: PhosphorusState) -> Self {
        Self([
            g.r, g.nrint, n.n_org, n.nh4, n.no2, n.no3, p.pop, p.srp, p.p_ma_int, p.p_r_int,
        ])
    }

    /// Initial vector built from a seasonal bundle.
    fn seasonal(bundle: &SeasonalBundle) -> Self {
        Self([
            bundle.r,
            bundle.nrint,
            bundle.n_org,
            bundle.nh4,
            bundle.no2,
            bundle.no3,
            bundle.pop,
            bundle.srp,
            bundle.p_ma_int,
            bundle.p_r_int,
        ])
    }
}

impl TryFrom<&[f64]> for BioVector {
    type Error = anyhow::Error;

    fn try_from(vals: &[f64]) -> Result<Self> {
        let len = vals.len();
        if len != BIO_LEN {
            bail!("vector length must be {BIO_LEN}, but is {len}");
        }
        if let Some(val) = vals.iter().find(|val| !val.is_finite() || **val < 0.0) {
            bail!("vector must have only finite non-negative elements, but has {val}");
        }
        let mut arr = [0.0; BIO_LEN];
        arr.copy_from_slice(vals);
        Ok(Self(arr))
    }
}

/// Advances one cell's [`BioVector`] by chaining the growth, nitrogen and
/// phosphorus models.
#[derive(Debug, Clone)]
pub struct CellStepper {
    growth: GrowthModel,
    nitrogen: NitrogenCycleModel,
    phosphorus: PhosphorusCycleModel,
    seed: BioVector,
}

impl CellStepper {
    pub fn new(bundle: &SeasonalBundle) -> Self {
        let solver = Solver::default();
        Self {
            growth: GrowthModel::new(GrowthParams::default(), bundle, solver.clone()),
            nitrogen: NitrogenCycleModel::new(NitrogenParams::default(), bundle, solver.clone()),
            phosphorus: PhosphorusCycleModel::new(PhosphorusParams::default(), bundle, solver),
            seed: BioVector::seasonal(bundle),
        }
    }

    /// Step a cell at day `t`.
    ///
    /// `t == 0` populates the vector from the seasonal bundle. Otherwise an
    /// all-zero vector is returned unchanged and any other vector is advanced
    /// by the three models at time `t + 1`.
    pub fn step(&self, t: usize, bio: &BioVector) -> Result<BioVector> {
        let (src, target) = if t == 0 {
            (&self.seed, 0)
        } else if bio.is_zero() {
            return Ok(*bio);
        } else {
            (bio, t + 1)
        };

        let nitrogen = src.nitrogen();
        let growth = self.growth.advance(nitrogen.nh4, nitrogen.no3, src.growth(), target)?;
        let nitrogen = self.nitrogen.advance(growth.r, nitrogen, target)?;
        let phosphorus = self.phosphorus.advance(src.phosphorus(), &growth, target)?;

        Ok(BioVector::from_parts(growth, nitrogen, phosphorus))
    }
}
