//! Depth-keyed P/S velocity models.

/// One sample of a 1-D velocity model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocitySample {
    pub depth_km: f64,
    /// P-wave velocity, km/s.
    pub vp: f64,
    /// S-wave velocity, km/s.
    pub vs: f64,
}

const fn sample(depth_km: f64, vp: f64, vs: f64) -> VelocitySample {
    VelocitySample { depth_km, vp, vs }
}

/// A 1-D layered velocity model with samples sorted by depth.
///
/// Invariant: `vs < vp` at every sample, so linear interpolation keeps
/// `vs < vp` at every depth and S always arrives after P.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityModel {
    pub name: &'static str,
    pub samples: &'static [VelocitySample],
}

impl VelocityModel {
    /// `(vp, vs)` at `depth_km`, linearly interpolated between bracketing
    /// samples and clamped to the first/last sample outside the table.
    pub fn at_depth(&self, depth_km: f64) -> (f64, f64) {
        let samples = self.samples;
        let first = samples[0];
        let last = samples[samples.len() - 1];

        if depth_km <= first.depth_km {
            return (first.vp, first.vs);
        }
        if depth_km >= last.depth_km {
            return (last.vp, last.vs);
        }

        for pair in samples.windows(2) {
            let (upper, lower) = (pair[0], pair[1]);
            if depth_km >= upper.depth_km && depth_km <= lower.depth_km {
                let span = lower.depth_km - upper.depth_km;
                let t = if span > 0.0 {
                    (depth_km - upper.depth_km) / span
                } else {
                    0.0
                };
                return (
                    upper.vp + t * (lower.vp - upper.vp),
                    upper.vs + t * (lower.vs - upper.vs),
                );
            }
        }
        (last.vp, last.vs)
    }
}

/// Damaged upper crust along the North Anatolian strike-slip system.
pub const NORTH_ANATOLIAN: VelocityModel = VelocityModel {
    name: "north_anatolian",
    samples: &[
        sample(0.0, 5.40, 3.10),
        sample(5.0, 5.80, 3.35),
        sample(10.0, 6.00, 3.46),
        sample(20.0, 6.30, 3.64),
        sample(30.0, 6.70, 3.85),
        sample(40.0, 7.80, 4.40),
        sample(100.0, 8.00, 4.50),
        sample(700.0, 10.30, 5.60),
    ],
};

pub const EAST_ANATOLIAN: VelocityModel = VelocityModel {
    name: "east_anatolian",
    samples: &[
        sample(0.0, 5.50, 3.15),
        sample(5.0, 5.90, 3.40),
        sample(10.0, 6.10, 3.50),
        sample(20.0, 6.40, 3.70),
        sample(35.0, 6.80, 3.90),
        sample(45.0, 7.90, 4.45),
        sample(100.0, 8.05, 4.50),
        sample(700.0, 10.30, 5.60),
    ],
};

/// Thin, extended crust of the western Anatolian grabens.
pub const AEGEAN: VelocityModel = VelocityModel {
    name: "aegean",
    samples: &[
        sample(0.0, 5.20, 3.00),
        sample(5.0, 5.70, 3.30),
        sample(10.0, 6.00, 3.45),
        sample(20.0, 6.40, 3.70),
        sample(28.0, 7.70, 4.35),
        sample(100.0, 8.00, 4.45),
        sample(700.0, 10.30, 5.60),
    ],
};

/// Thick plateau crust.
pub const CENTRAL_ANATOLIA: VelocityModel = VelocityModel {
    name: "central_anatolia",
    samples: &[
        sample(0.0, 5.70, 3.30),
        sample(10.0, 6.10, 3.52),
        sample(20.0, 6.40, 3.70),
        sample(35.0, 6.90, 3.95),
        sample(42.0, 7.90, 4.45),
        sample(100.0, 8.10, 4.50),
        sample(700.0, 10.30, 5.60),
    ],
};

/// Sediment-covered continental margin.
pub const BLACK_SEA: VelocityModel = VelocityModel {
    name: "black_sea",
    samples: &[
        sample(0.0, 5.00, 2.85),
        sample(5.0, 5.90, 3.40),
        sample(15.0, 6.30, 3.63),
        sample(30.0, 6.80, 3.90),
        sample(38.0, 7.90, 4.45),
        sample(100.0, 8.00, 4.50),
        sample(700.0, 10.30, 5.60),
    ],
};

/// Global average continental model (ak135-like).
pub const GLOBAL: VelocityModel = VelocityModel {
    name: "global",
    samples: &[
        sample(0.0, 5.80, 3.46),
        sample(20.0, 6.50, 3.85),
        sample(35.0, 8.04, 4.48),
        sample(120.0, 8.05, 4.50),
        sample(210.0, 8.30, 4.52),
        sample(410.0, 9.36, 5.08),
        sample(660.0, 10.20, 5.60),
        sample(700.0, 10.35, 5.65),
    ],
};

pub const ALL_MODELS: [VelocityModel; 6] = [
    NORTH_ANATOLIAN,
    EAST_ANATOLIAN,
    AEGEAN,
    CENTRAL_ANATOLIA,
    BLACK_SEA,
    GLOBAL,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_sample_has_vs_below_vp() {
        for model in ALL_MODELS {
            for s in model.samples {
                assert!(s.vs < s.vp, "{} at {} km", model.name, s.depth_km);
            }
        }
    }

    #[test]
    fn test_samples_sorted_by_depth() {
        for model in ALL_MODELS {
            for pair in model.samples.windows(2) {
                assert!(pair[0].depth_km < pair[1].depth_km, "{}", model.name);
            }
        }
    }

    #[test]
    fn test_tables_cover_full_depth_range() {
        for model in ALL_MODELS {
            assert_eq!(model.samples[0].depth_km, 0.0, "{}", model.name);
            assert_eq!(
                model.samples[model.samples.len() - 1].depth_km,
                700.0,
                "{}",
                model.name
            );
        }
    }

    #[test]
    fn test_exact_sample_lookup() {
        assert_eq!(NORTH_ANATOLIAN.at_depth(10.0), (6.00, 3.46));
    }

    #[test]
    fn test_interpolates_between_samples() {
        let (vp, vs) = NORTH_ANATOLIAN.at_depth(15.0);
        assert!((vp - 6.15).abs() < 1e-9);
        assert!((vs - 3.55).abs() < 1e-9);
    }

    #[test]
    fn test_clamps_outside_table() {
        assert_eq!(GLOBAL.at_depth(-5.0), (5.80, 3.46));
        assert_eq!(GLOBAL.at_depth(900.0), (10.35, 5.65));
    }

    #[test]
    fn test_interpolated_vs_below_vp_everywhere() {
        for model in ALL_MODELS {
            let mut depth = 0.0;
            while depth <= 700.0 {
                let (vp, vs) = model.at_depth(depth);
                assert!(vs < vp, "{} at {} km", model.name, depth);
                depth += 0.5;
            }
        }
    }
}
