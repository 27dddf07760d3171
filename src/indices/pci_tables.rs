//! ASTM D6433 asphalt distress catalog and curve data.
//!
//! Deduct values are modelled per (type, severity) as `a * ln(density) + b`,
//! a log-linear fit of the published deduct-value curves. Within each type
//! both `a` and `b` ascend Low -> Medium -> High. Steeper lines undercut
//! shallower ones below the density where they cross (`ln d < 0`), so every
//! lower-severity line must already be clamped to zero at that crossing or
//! the ordering would invert at small densities. All slopes are positive, so
//! the deduct value never decreases with density.
//!
//! The correction curves are linear fits `CDV ~ slope * TDV + intercept` of
//! the ASTM asphalt correction chart for q = 2..=7.

use serde::{Deserialize, Serialize};

use super::Severity;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DistressUnit {
    SquareMeters,
    Meters,
    Count,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum PciDistressType {
    AlligatorCracking,
    Bleeding,
    BlockCracking,
    BumpsAndSags,
    Corrugation,
    Depression,
    EdgeCracking,
    JointReflectionCracking,
    LaneShoulderDropOff,
    LongitudinalTransverseCracking,
    Patching,
    PolishedAggregate,
    Potholes,
    RailroadCrossing,
    Rutting,
    Shoving,
    SlippageCracking,
    Swell,
    WeatheringRaveling,
}

/// `(a, b)` for Low, Medium, High.
type CurveRow = [(f64, f64); 3];

struct DistressSpec {
    code: u8,
    name: &'static str,
    unit: DistressUnit,
    curves: CurveRow,
}

const CATALOG: [DistressSpec; 19] = [
    DistressSpec {
        code: 1,
        name: "Alligator Cracking",
        unit: DistressUnit::SquareMeters,
        curves: [(13.0, 18.0), (17.0, 24.0), (22.0, 32.0)],
    },
    DistressSpec {
        code: 2,
        name: "Bleeding",
        unit: DistressUnit::SquareMeters,
        curves: [(2.5, 2.0), (4.5, 5.0), (7.0, 9.0)],
    },
    DistressSpec {
        code: 3,
        name: "Block Cracking",
        unit: DistressUnit::SquareMeters,
        curves: [(5.0, 5.0), (8.0, 10.0), (12.0, 16.0)],
    },
    DistressSpec {
        code: 4,
        name: "Bumps and Sags",
        unit: DistressUnit::Meters,
        curves: [(8.0, 12.0), (13.0, 24.0), (18.0, 40.0)],
    },
    DistressSpec {
        code: 5,
        name: "Corrugation",
        unit: DistressUnit::SquareMeters,
        curves: [(6.0, 8.0), (11.0, 18.0), (16.0, 32.0)],
    },
    DistressSpec {
        code: 6,
        name: "Depression",
        unit: DistressUnit::SquareMeters,
        curves: [(7.0, 8.0), (10.0, 14.0), (13.0, 22.0)],
    },
    DistressSpec {
        code: 7,
        name: "Edge Cracking",
        unit: DistressUnit::Meters,
        curves: [(4.0, 6.0), (6.0, 11.0), (9.0, 17.0)],
    },
    DistressSpec {
        code: 8,
        name: "Joint Reflection Cracking",
        unit: DistressUnit::Meters,
        curves: [(4.0, 4.0), (7.0, 11.0), (11.0, 22.0)],
    },
    DistressSpec {
        code: 9,
        name: "Lane/Shoulder Drop-Off",
        unit: DistressUnit::Meters,
        curves: [(3.0, 4.0), (5.0, 8.0), (8.0, 14.0)],
    },
    DistressSpec {
        code: 10,
        name: "Longitudinal and Transverse Cracking",
        unit: DistressUnit::Meters,
        curves: [(4.0, 3.0), (8.0, 10.0), (12.0, 20.0)],
    },
    DistressSpec {
        code: 11,
        name: "Patching and Utility Cut Patching",
        unit: DistressUnit::SquareMeters,
        curves: [(5.0, 5.0), (9.0, 14.0), (14.0, 26.0)],
    },
    DistressSpec {
        code: 12,
        name: "Polished Aggregate",
        unit: DistressUnit::SquareMeters,
        curves: [(2.0, 1.0), (2.5, 1.5), (3.0, 2.0)],
    },
    DistressSpec {
        code: 13,
        name: "Potholes",
        unit: DistressUnit::Count,
        curves: [(16.0, 38.0), (19.0, 55.0), (22.0, 70.0)],
    },
    DistressSpec {
        code: 14,
        name: "Railroad Crossing",
        unit: DistressUnit::SquareMeters,
        curves: [(3.0, 2.0), (8.0, 16.0), (15.0, 38.0)],
    },
    DistressSpec {
        code: 15,
        name: "Rutting",
        unit: DistressUnit::SquareMeters,
        curves: [(8.0, 10.0), (12.0, 20.0), (16.0, 32.0)],
    },
    DistressSpec {
        code: 16,
        name: "Shoving",
        unit: DistressUnit::SquareMeters,
        curves: [(6.0, 8.0), (10.0, 16.0), (14.0, 28.0)],
    },
    DistressSpec {
        code: 17,
        name: "Slippage Cracking",
        unit: DistressUnit::SquareMeters,
        curves: [(5.0, 6.0), (9.0, 14.0), (13.0, 24.0)],
    },
    DistressSpec {
        code: 18,
        name: "Swell",
        unit: DistressUnit::SquareMeters,
        curves: [(3.0, 3.0), (10.0, 16.0), (18.0, 38.0)],
    },
    DistressSpec {
        code: 19,
        name: "Weathering and Raveling",
        unit: DistressUnit::SquareMeters,
        curves: [(2.5, 2.0), (6.0, 8.0), (11.0, 18.0)],
    },
];

impl PciDistressType {
    pub const ALL: [PciDistressType; 19] = [
        PciDistressType::AlligatorCracking,
        PciDistressType::Bleeding,
        PciDistressType::BlockCracking,
        PciDistressType::BumpsAndSags,
        PciDistressType::Corrugation,
        PciDistressType::Depression,
        PciDistressType::EdgeCracking,
        PciDistressType::JointReflectionCracking,
        PciDistressType::LaneShoulderDropOff,
        PciDistressType::LongitudinalTransverseCracking,
        PciDistressType::Patching,
        PciDistressType::PolishedAggregate,
        PciDistressType::Potholes,
        PciDistressType::RailroadCrossing,
        PciDistressType::Rutting,
        PciDistressType::Shoving,
        PciDistressType::SlippageCracking,
        PciDistressType::Swell,
        PciDistressType::WeatheringRaveling,
    ];

    fn spec(&self) -> &'static DistressSpec {
        // declaration order matches CATALOG
        &CATALOG[*self as usize]
    }

    /// ASTM D6433 distress number.
    pub fn code(&self) -> u8 {
        self.spec().code
    }

    pub fn name(&self) -> &'static str {
        self.spec().name
    }

    pub fn unit(&self) -> DistressUnit {
        self.spec().unit
    }

    pub fn curve(&self, severity: Severity) -> (f64, f64) {
        let index = match severity {
            Severity::Low => 0,
            Severity::Medium => 1,
            Severity::High => 2,
        };
        self.spec().curves[index]
    }
}

/// `(slope, intercept)` for q = 2..=7.
const CORRECTION_CURVES: [(f64, f64); 6] = [
    (0.80, -5.0),
    (0.72, -6.0),
    (0.66, -7.0),
    (0.62, -7.5),
    (0.58, -7.0),
    (0.55, -6.0),
];

/// Correction curve for `q` deducts above the significance threshold.
/// q = 1 is the identity; q > 7 extrapolates the slope downwards.
pub fn correction_curve(q: usize) -> (f64, f64) {
    match q {
        0 | 1 => (1.0, 0.0),
        2..=7 => CORRECTION_CURVES[q - 2],
        _ => ((0.55 - 0.02 * (q - 7) as f64).max(0.35), -6.0),
    }
}
