//! Coupled seagrass cellular automaton and biogeochemical ODE engine.
//!
//! Every cell of a rectangular seabed grid carries a discrete state and a
//! ten-component biogeochemical vector. Each simulated week advances every
//! vector through seven daily steps of the growth, nitrogen and phosphorus
//! models, then applies the stochastic transition rule to the discrete states.

pub mod analysis;
pub mod automaton;
pub mod cell;
pub mod config;
pub mod engine;
pub mod growth;
pub mod kinetics;
pub mod manager;
pub mod nitrogen;
pub mod phosphorus;
pub mod season;
pub mod snapshot;
pub mod solver;
pub mod stats;
