//! Classical orbital elements

use nalgebra::Vector3;
use rand::Rng;
use satkit::Instant;
use std::ops::Range;

use super::{EARTH_RADIUS_KM, MU_EARTH_KM3_S2};

/// The six classical Keplerian elements plus epoch.
///
/// Angles are stored in radians. Semi-major axis is measured from the
/// geocenter in kilometers.
#[derive(Debug, Clone, Copy)]
pub struct ClassicalElements {
    /// Semi-major axis (km)
    pub semi_major_axis_km: f64,
    /// Eccentricity (dimensionless, [0, 1) for closed orbits)
    pub eccentricity: f64,
    /// Inclination (rad)
    pub inclination: f64,
    /// Right ascension of the ascending node (rad)
    pub raan: f64,
    /// Argument of perigee (rad)
    pub arg_perigee: f64,
    /// Mean anomaly at epoch (rad)
    pub mean_anomaly: f64,
    /// Epoch of the elements
    pub epoch: Instant,
}

impl ClassicalElements {
    /// Mean motion in rad/s
    pub fn mean_motion_rad_s(&self) -> f64 {
        (MU_EARTH_KM3_S2 / self.semi_major_axis_km.powi(3)).sqrt()
    }

    /// Mean motion in revolutions per day (the unit the catalog encoding uses)
    pub fn mean_motion_rev_day(&self) -> f64 {
        self.mean_motion_rad_s() * 86_400.0 / (2.0 * std::f64::consts::PI)
    }

    /// Orbital period in seconds
    pub fn period_s(&self) -> f64 {
        2.0 * std::f64::consts::PI / self.mean_motion_rad_s()
    }

    /// Perigee altitude above the surface (km)
    pub fn perigee_km(&self) -> f64 {
        self.semi_major_axis_km * (1.0 - self.eccentricity) - EARTH_RADIUS_KM
    }

    /// Apogee altitude above the surface (km)
    pub fn apogee_km(&self) -> f64 {
        self.semi_major_axis_km * (1.0 + self.eccentricity) - EARTH_RADIUS_KM
    }

    /// Recover classical elements from a Cartesian ECI state.
    ///
    /// Near-circular and near-equatorial orbits have ill-defined node and
    /// perigee angles; those degenerate angles collapse to zero rather than
    /// producing NaN.
    pub fn from_state_vector(
        pos_km: Vector3<f64>,
        vel_km_s: Vector3<f64>,
        epoch: Instant,
    ) -> Option<Self> {
        const EPS: f64 = 1.0e-10;

        let r = pos_km.norm();
        let v2 = vel_km_s.norm_squared();
        if r < EPS {
            return None;
        }

        let energy = 0.5 * v2 - MU_EARTH_KM3_S2 / r;
        if energy >= 0.0 {
            // Parabolic/hyperbolic states have no closed-orbit elements
            return None;
        }
        let semi_major_axis_km = -MU_EARTH_KM3_S2 / (2.0 * energy);

        let h = pos_km.cross(&vel_km_s);
        let h_norm = h.norm();
        if h_norm < EPS {
            return None;
        }

        let e_vec = ((v2 - MU_EARTH_KM3_S2 / r) * pos_km - pos_km.dot(&vel_km_s) * vel_km_s)
            / MU_EARTH_KM3_S2;
        let eccentricity = e_vec.norm();

        let inclination = (h.z / h_norm).clamp(-1.0, 1.0).acos();

        // Node vector lies along z-hat x h
        let n = Vector3::new(-h.y, h.x, 0.0);
        let n_norm = n.norm();

        let raan = if n_norm < EPS {
            0.0
        } else {
            let mut raan = (n.x / n_norm).clamp(-1.0, 1.0).acos();
            if n.y < 0.0 {
                raan = 2.0 * std::f64::consts::PI - raan;
            }
            raan
        };

        let arg_perigee = if n_norm < EPS || eccentricity < EPS {
            0.0
        } else {
            let mut w = (n.dot(&e_vec) / (n_norm * eccentricity))
                .clamp(-1.0, 1.0)
                .acos();
            if e_vec.z < 0.0 {
                w = 2.0 * std::f64::consts::PI - w;
            }
            w
        };

        // True anomaly, then mean anomaly via the eccentric anomaly
        let true_anomaly = if eccentricity < EPS {
            // Circular: measure from the node (or x-axis when equatorial)
            let reference = if n_norm < EPS {
                Vector3::new(1.0, 0.0, 0.0)
            } else {
                n / n_norm
            };
            let mut nu = (reference.dot(&pos_km) / r).clamp(-1.0, 1.0).acos();
            if pos_km.z < 0.0 {
                nu = 2.0 * std::f64::consts::PI - nu;
            }
            nu
        } else {
            let mut nu = (e_vec.dot(&pos_km) / (eccentricity * r))
                .clamp(-1.0, 1.0)
                .acos();
            if pos_km.dot(&vel_km_s) < 0.0 {
                nu = 2.0 * std::f64::consts::PI - nu;
            }
            nu
        };

        let ecc_anomaly = 2.0
            * (((1.0 - eccentricity) / (1.0 + eccentricity)).sqrt() * (true_anomaly / 2.0).tan())
                .atan();
        let mut mean_anomaly = ecc_anomaly - eccentricity * ecc_anomaly.sin();
        if mean_anomaly < 0.0 {
            mean_anomaly += 2.0 * std::f64::consts::PI;
        }

        Some(Self {
            semi_major_axis_km,
            eccentricity,
            inclination,
            raan,
            arg_perigee,
            mean_anomaly,
            epoch,
        })
    }
}

/// Draw random near-circular elements with an altitude in the given band.
///
/// Semi-major axis is Earth radius plus a uniformly drawn altitude,
/// eccentricity is uniform in [0, 0.05) and every angle is uniform over its
/// full range, which spreads synthetic constellations evenly around the
/// globe.
pub fn random_elements<R: Rng + ?Sized>(
    altitude_range_km: Range<f64>,
    epoch: Instant,
    rng: &mut R,
) -> ClassicalElements {
    use std::f64::consts::PI;

    let altitude = rng.gen_range(altitude_range_km);
    ClassicalElements {
        semi_major_axis_km: EARTH_RADIUS_KM + altitude,
        eccentricity: rng.gen_range(0.0..0.05),
        inclination: rng.gen_range(0.0..PI),
        raan: rng.gen_range(0.0..2.0 * PI),
        arg_perigee: rng.gen_range(0.0..2.0 * PI),
        mean_anomaly: rng.gen_range(0.0..2.0 * PI),
        epoch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_epoch() -> Instant {
        Instant::from_datetime(2026, 3, 1, 12, 0, 0.0).unwrap()
    }

    #[test]
    fn test_mean_motion_leo() {
        // ~400 km circular orbit: period ~92.5 minutes, ~15.5 rev/day
        let elems = ClassicalElements {
            semi_major_axis_km: EARTH_RADIUS_KM + 400.0,
            eccentricity: 0.0,
            inclination: 0.9,
            raan: 0.0,
            arg_perigee: 0.0,
            mean_anomaly: 0.0,
            epoch: test_epoch(),
        };

        assert!((elems.period_s() / 60.0 - 92.5).abs() < 1.0);
        assert!((elems.mean_motion_rev_day() - 15.5).abs() < 0.2);
    }

    #[test]
    fn test_from_state_vector_circular() {
        // Equatorial circular orbit at 7000 km radius
        let r = 7000.0;
        let v = (MU_EARTH_KM3_S2 / r).sqrt();
        let elems = ClassicalElements::from_state_vector(
            Vector3::new(r, 0.0, 0.0),
            Vector3::new(0.0, v, 0.0),
            test_epoch(),
        )
        .unwrap();

        assert!((elems.semi_major_axis_km - r).abs() < 1.0e-6);
        assert!(elems.eccentricity < 1.0e-8);
        assert!(elems.inclination.abs() < 1.0e-8);
    }

    #[test]
    fn test_from_state_vector_inclined_elliptical() {
        // Perigee of an inclined elliptical orbit: r_p = a(1-e)
        let a = 8000.0;
        let e = 0.1;
        let r_p = a * (1.0 - e);
        let v_p = (MU_EARTH_KM3_S2 * (2.0 / r_p - 1.0 / a)).sqrt();
        let inc: f64 = 0.5;

        // Perigee on the x-axis, velocity in the rotated orbital plane
        let elems = ClassicalElements::from_state_vector(
            Vector3::new(r_p, 0.0, 0.0),
            Vector3::new(0.0, v_p * inc.cos(), v_p * inc.sin()),
            test_epoch(),
        )
        .unwrap();

        assert!((elems.semi_major_axis_km - a).abs() / a < 1.0e-9);
        assert!((elems.eccentricity - e).abs() < 1.0e-9);
        assert!((elems.inclination - inc).abs() < 1.0e-9);
        // At perigee the mean anomaly is zero
        assert!(elems.mean_anomaly < 1.0e-6 || elems.mean_anomaly > 2.0 * std::f64::consts::PI - 1.0e-6);
    }

    #[test]
    fn test_hyperbolic_state_rejected() {
        let r = 7000.0;
        let v_escape = (2.0 * MU_EARTH_KM3_S2 / r).sqrt();
        let elems = ClassicalElements::from_state_vector(
            Vector3::new(r, 0.0, 0.0),
            Vector3::new(0.0, v_escape * 1.1, 0.0),
            test_epoch(),
        );
        assert!(elems.is_none());
    }

    #[test]
    fn test_random_elements_bounds() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let elems = random_elements(400.0..2000.0, test_epoch(), &mut rng);
            let alt = elems.semi_major_axis_km - EARTH_RADIUS_KM;
            assert!((400.0..2000.0).contains(&alt));
            assert!((0.0..0.05).contains(&elems.eccentricity));
            assert!((0.0..std::f64::consts::PI).contains(&elems.inclination));
            assert!((0.0..2.0 * std::f64::consts::PI).contains(&elems.raan));
        }
    }
}
