//! Modified Mercalli Intensity from PGA.

pub const MIN_MMI: f64 = 1.0;
pub const MAX_MMI: f64 = 12.0;

/// `(pga_g, mmi)` breakpoints of the empirical ladder. 12 points, 11 segments.
const LADDER: [(f64, f64); 12] = [
    (0.0005, 1.0),
    (0.0017, 2.0),
    (0.007, 3.0),
    (0.014, 4.0),
    (0.039, 5.0),
    (0.092, 6.0),
    (0.18, 7.0),
    (0.34, 8.0),
    (0.65, 9.0),
    (1.24, 10.0),
    (1.6, 11.0),
    (2.0, 12.0),
];

/// MMI for a PGA in g, piecewise-linear between ladder points, in `[1, 12]`.
pub fn mmi_from_pga(pga_g: f64) -> f64 {
    if !pga_g.is_finite() || pga_g <= LADDER[0].0 {
        return MIN_MMI;
    }
    for pair in LADDER.windows(2) {
        let ((p0, m0), (p1, m1)) = (pair[0], pair[1]);
        if pga_g <= p1 {
            let t = (pga_g - p0) / (p1 - p0);
            return (m0 + t * (m1 - m0)).clamp(MIN_MMI, MAX_MMI);
        }
    }
    MAX_MMI
}

pub fn mmi_uncertainty(mmi: f64) -> f64 {
    if mmi >= 8.0 {
        1.0
    } else if mmi >= 6.0 {
        0.75
    } else {
        0.5
    }
}

/// Roman numeral for an MMI value, rounded to the nearest level.
pub fn roman(mmi: f64) -> &'static str {
    const NUMERALS: [&str; 12] = [
        "I", "II", "III", "IV", "V", "VI", "VII", "VIII", "IX", "X", "XI", "XII",
    ];
    let level = mmi.round().clamp(MIN_MMI, MAX_MMI) as usize;
    NUMERALS[level - 1]
}
