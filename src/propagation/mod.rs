//! Orbital propagation
//!
//! Two interchangeable strategies share one contract: given an entity's
//! orbital state and a simulated time, produce Cartesian position (km) and
//! velocity (km/s) in an Earth-centered inertial frame.
//!
//! - [`analytic`]: SGP4 seeded from the catalog-form state. The reference
//!   for every entity's first state.
//! - [`numerical`]: a two-body midpoint integrator, lazily seeded from the
//!   analytic output so both methods start from the same point.
//!
//! Both strategies skip recomputation when the elapsed *simulated* time
//! since an entity's last update is under [`STALE_THRESHOLD_S`]; at two
//! million entities that staleness is the difference between interactive
//! and unusable frame rates.

pub mod analytic;
mod clock;
pub mod numerical;

pub use clock::SimClock;
pub use numerical::TwoBodyState;

use nalgebra::Vector3;

/// Skip threshold for per-entity updates, in simulated seconds. Applied to
/// simulated (not wall) time, so high multipliers still update every frame.
pub const STALE_THRESHOLD_S: f64 = 0.050;

/// A propagated Cartesian state: kilometers and kilometers per second, ECI.
#[derive(Debug, Clone, Copy)]
pub struct StateKm {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
}

/// Which propagation strategy an entity uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropagationMethod {
    /// SGP4 from catalog elements
    #[default]
    Analytic,
    /// Two-body midpoint integration from the last Cartesian state
    Numerical,
}

impl PropagationMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Analytic => "SGP4",
            Self::Numerical => "Two-body RK2",
        }
    }
}
