//! Pavement Condition Index (ASTM D6433).
//!
//! Density -> deduct value per observation, then the iterative corrected
//! deduct value procedure: PCI = 100 - max(CDV).

use serde::{Deserialize, Serialize};

use super::pci_tables::{correction_curve, PciDistressType};
use super::Severity;
use crate::utils::truncated_mean;

pub const DEFAULT_SAMPLE_AREA_M2: f64 = 232.0;

/// Deduct values at or below this are insignificant.
const SIGNIFICANT_DEDUCT: f64 = 2.0;
const MIN_DENSITY: f64 = 0.01;
const MAX_DENSITY: f64 = 100.0;

/// One observed distress in a sample unit. Density and deduct value are
/// derived from quantity and sample area and recomputed whenever either
/// changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", from = "PciDistressRecord")]
pub struct PciDistressItem {
    distress_type: PciDistressType,
    severity: Severity,
    quantity: f64,
    sample_area_m2: f64,
    density: f64,
    deduct_value: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PciDistressRecord {
    distress_type: PciDistressType,
    severity: Severity,
    quantity: f64,
    sample_area_m2: f64,
}

impl From<PciDistressRecord> for PciDistressItem {
    fn from(record: PciDistressRecord) -> Self {
        PciDistressItem::new(
            record.distress_type,
            record.severity,
            record.quantity,
            record.sample_area_m2,
        )
    }
}

impl PciDistressItem {
    pub fn new(
        distress_type: PciDistressType,
        severity: Severity,
        quantity: f64,
        sample_area_m2: f64,
    ) -> Self {
        let mut item = Self {
            distress_type,
            severity,
            quantity,
            sample_area_m2,
            density: 0.0,
            deduct_value: 0.0,
        };
        item.recompute();
        item
    }

    pub fn distress_type(&self) -> PciDistressType {
        self.distress_type
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn sample_area_m2(&self) -> f64 {
        self.sample_area_m2
    }

    /// Extent as a percentage of the sample unit, unclamped.
    pub fn density(&self) -> f64 {
        self.density
    }

    pub fn deduct_value(&self) -> f64 {
        self.deduct_value
    }

    pub fn set_quantity(&mut self, quantity: f64) {
        self.quantity = quantity;
        self.recompute();
    }

    pub fn set_sample_area(&mut self, sample_area_m2: f64) {
        self.sample_area_m2 = sample_area_m2;
        self.recompute();
    }

    fn recompute(&mut self) {
        if self.quantity > 0.0 && self.sample_area_m2 > 0.0 {
            self.density = self.quantity / self.sample_area_m2 * 100.0;
            self.deduct_value = deduct_value(self.distress_type, self.severity, self.density);
        } else {
            self.density = 0.0;
            self.deduct_value = 0.0;
        }
    }
}

/// Deduct value for a density (percent). Non-positive density deducts nothing.
pub fn deduct_value(distress_type: PciDistressType, severity: Severity, density: f64) -> f64 {
    if !(density > 0.0) {
        return 0.0;
    }
    let (a, b) = distress_type.curve(severity);
    let density = density.clamp(MIN_DENSITY, MAX_DENSITY);
    (a * density.ln() + b).clamp(0.0, 100.0)
}

/// `TDV x correctionFactor`, with the factor held to [0.1, 1.0].
pub fn corrected_deduct_value(total_deduct: f64, q: usize) -> f64 {
    if !(total_deduct > 0.0) {
        return 0.0;
    }
    let (slope, intercept) = correction_curve(q);
    let factor = ((slope * total_deduct + intercept) / total_deduct).clamp(0.1, 1.0);
    (total_deduct * factor).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum PciRating {
    Failed,
    VeryPoor,
    Poor,
    Fair,
    Good,
    VeryGood,
    Excellent,
}

impl PciRating {
    pub fn from_score(score: u8) -> Self {
        match score {
            86..=u8::MAX => PciRating::Excellent,
            71..=85 => PciRating::VeryGood,
            56..=70 => PciRating::Good,
            41..=55 => PciRating::Fair,
            26..=40 => PciRating::Poor,
            11..=25 => PciRating::VeryPoor,
            _ => PciRating::Failed,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PciRating::Excellent => "Excellent",
            PciRating::VeryGood => "Very Good",
            PciRating::Good => "Good",
            PciRating::Fair => "Fair",
            PciRating::Poor => "Poor",
            PciRating::VeryPoor => "Very Poor",
            PciRating::Failed => "Failed",
        }
    }

    pub fn recommended_action(&self) -> &'static str {
        match self {
            PciRating::Excellent => "Routine maintenance",
            PciRating::VeryGood => "Preventive maintenance (crack sealing)",
            PciRating::Good => "Preventive maintenance and minor repairs",
            PciRating::Fair => "Surface treatment or thin overlay",
            PciRating::Poor => "Structural overlay",
            PciRating::VeryPoor => "Major rehabilitation",
            PciRating::Failed => "Reconstruction",
        }
    }
}

/// One pass of the CDV loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CdvIteration {
    pub q: usize,
    pub total_deduct: f64,
    pub corrected_deduct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PciResult {
    pub pci: u8,
    pub rating: PciRating,
    pub max_cdv: f64,
    /// Sum of significant deduct values before any correction.
    pub total_deduct: f64,
    pub breakdown: Vec<PciDistressItem>,
    pub iterations: Vec<CdvIteration>,
}

#[derive(Debug, Clone, Copy)]
pub struct PciCalculator {
    sample_area_m2: f64,
}

impl Default for PciCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_AREA_M2)
    }
}

impl PciCalculator {
    pub fn new(sample_area_m2: f64) -> Self {
        Self { sample_area_m2 }
    }

    pub fn sample_area_m2(&self) -> f64 {
        self.sample_area_m2
    }

    /// Builds an observation against this calculator's sample unit.
    pub fn item(
        &self,
        distress_type: PciDistressType,
        severity: Severity,
        quantity: f64,
    ) -> PciDistressItem {
        PciDistressItem::new(distress_type, severity, quantity, self.sample_area_m2)
    }

    /// Computes PCI for the given `(type, severity, quantity)` observations.
    pub fn calculate(&self, observations: &[(PciDistressType, Severity, f64)]) -> PciResult {
        let items: Vec<PciDistressItem> = observations
            .iter()
            .map(|(t, s, q)| self.item(*t, *s, *q))
            .collect();
        Self::evaluate(items)
    }

    /// Computes PCI for items that already carry their deduct values.
    pub fn evaluate(items: Vec<PciDistressItem>) -> PciResult {
        let deducts: Vec<f64> = items.iter().map(PciDistressItem::deduct_value).collect();
        let (max_cdv, iterations) = max_corrected_deduct(&deducts);
        let total_deduct = iterations.first().map(|i| i.total_deduct).unwrap_or(0.0);
        let pci = (100.0 - max_cdv).clamp(0.0, 100.0).trunc() as u8;

        PciResult {
            pci,
            rating: PciRating::from_score(pci),
            max_cdv,
            total_deduct,
            breakdown: items,
            iterations,
        }
    }
}

/// Runs the ASTM corrected deduct value iteration. Returns the maximum CDV
/// and the pass log; no significant deducts means (0, []) and PCI 100.
///
/// Each pass either stops or permanently lowers one value to 2.0, so the
/// loop runs at most `deducts.len()` times.
pub fn max_corrected_deduct(deducts: &[f64]) -> (f64, Vec<CdvIteration>) {
    let mut values: Vec<f64> = deducts
        .iter()
        .copied()
        .filter(|v| *v > SIGNIFICANT_DEDUCT)
        .collect();
    if values.is_empty() {
        return (0.0, Vec::new());
    }
    values.sort_by(|a, b| b.total_cmp(a));

    let mut iterations = Vec::with_capacity(values.len());
    let mut max_cdv: f64 = 0.0;
    // values stay sorted descending, so `next` is the largest value still > 2
    let mut next = 0;
    loop {
        let total_deduct: f64 = values.iter().sum();
        let q = values.iter().filter(|v| **v > SIGNIFICANT_DEDUCT).count();
        let corrected_deduct = corrected_deduct_value(total_deduct, q);
        max_cdv = max_cdv.max(corrected_deduct);
        iterations.push(CdvIteration {
            q,
            total_deduct,
            corrected_deduct,
        });

        if q <= 1 {
            break;
        }
        values[next] = SIGNIFICANT_DEDUCT;
        next += 1;
    }

    (max_cdv, iterations)
}

/// Average PCI over segments; 0 for an empty set.
pub fn average_pci(scores: &[u8]) -> u8 {
    truncated_mean(scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_distress_is_perfect() {
        let result = PciCalculator::default().calculate(&[]);
        assert_eq!(result.pci, 100);
        assert_eq!(result.rating, PciRating::Excellent);
        assert!(result.iterations.is_empty());
    }

    #[test]
    fn test_single_high_alligator_reference_case() {
        let calculator = PciCalculator::new(232.0);
        let result = calculator.calculate(&[(
            PciDistressType::AlligatorCracking,
            Severity::High,
            50.0,
        )]);
        let item = &result.breakdown[0];
        assert!((item.density() - 21.5517).abs() < 1e-3);

        let expected_dv = 22.0 * (50.0_f64 / 232.0 * 100.0).ln() + 32.0;
        assert!((item.deduct_value() - expected_dv).abs() < 1e-9);
        assert!(item.deduct_value() > 99.0);

        // q = 1: CDV = TDV
        assert_eq!(result.iterations.len(), 1);
        assert!((result.max_cdv - item.deduct_value()).abs() < 1e-9);
        assert_eq!(result.pci, (100.0 - expected_dv).trunc() as u8);
        assert_eq!(result.rating, PciRating::Failed);
    }

    #[test]
    fn test_insignificant_deducts_leave_pci_at_100() {
        let result = PciCalculator::default().calculate(&[(
            PciDistressType::PolishedAggregate,
            Severity::Low,
            0.5,
        )]);
        assert!(result.breakdown[0].deduct_value() <= 2.0);
        assert_eq!(result.pci, 100);
    }

    #[test]
    fn test_zero_quantity_and_zero_area_deduct_nothing() {
        let zero_qty = PciDistressItem::new(PciDistressType::Potholes, Severity::High, 0.0, 232.0);
        assert_eq!(zero_qty.deduct_value(), 0.0);
        let negative = PciDistressItem::new(PciDistressType::Potholes, Severity::High, -3.0, 232.0);
        assert_eq!(negative.deduct_value(), 0.0);

        let result = PciCalculator::new(0.0).calculate(&[(
            PciDistressType::Potholes,
            Severity::High,
            4.0,
        )]);
        assert_eq!(result.breakdown[0].deduct_value(), 0.0);
        assert_eq!(result.pci, 100);
    }

    #[test]
    fn test_density_clamped_before_curve() {
        let tiny = deduct_value(PciDistressType::Potholes, Severity::High, 1e-6);
        let floor = deduct_value(PciDistressType::Potholes, Severity::High, MIN_DENSITY);
        assert_eq!(tiny, floor);
        let huge = deduct_value(PciDistressType::Rutting, Severity::Low, 500.0);
        let cap = deduct_value(PciDistressType::Rutting, Severity::Low, 100.0);
        assert_eq!(huge, cap);
    }

    #[test]
    fn test_deduct_monotone_in_density_and_severity() {
        let densities: Vec<f64> = (0..=60).map(|i| 0.005 * 1.25_f64.powi(i)).collect();
        for distress_type in PciDistressType::ALL {
            for severity in Severity::ALL {
                let mut previous = 0.0;
                for density in &densities {
                    let dv = deduct_value(distress_type, severity, *density);
                    assert!(dv >= previous, "{} {:?} {density}", distress_type.name(), severity);
                    assert!((0.0..=100.0).contains(&dv));
                    previous = dv;
                }
            }
            for density in &densities {
                let low = deduct_value(distress_type, Severity::Low, *density);
                let medium = deduct_value(distress_type, Severity::Medium, *density);
                let high = deduct_value(distress_type, Severity::High, *density);
                assert!(high >= medium && medium >= low, "{}", distress_type.name());
            }
        }
    }

    #[test]
    fn test_alligator_high_not_below_medium_at_small_density() {
        for density in [0.15, 0.22, 0.25, 0.3, 0.35] {
            let medium = deduct_value(PciDistressType::AlligatorCracking, Severity::Medium, density);
            let high = deduct_value(PciDistressType::AlligatorCracking, Severity::High, density);
            assert!(high >= medium, "{density}: high {high} < medium {medium}");
        }
    }

    #[test]
    fn test_recompute_on_quantity_and_area_change() {
        let mut item = PciDistressItem::new(PciDistressType::Rutting, Severity::Medium, 10.0, 232.0);
        let before = item.deduct_value();
        item.set_quantity(40.0);
        assert!(item.deduct_value() > before);
        assert!((item.density() - 40.0 / 232.0 * 100.0).abs() < 1e-12);

        item.set_sample_area(185.0);
        assert!((item.density() - 40.0 / 185.0 * 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_deserialize_recomputes_derived_fields() {
        let json = r#"{
            "distressType": "potholes",
            "severity": "medium",
            "quantity": 2.0,
            "sampleAreaM2": 232.0,
            "density": 99.0,
            "deductValue": 1.0
        }"#;
        let item: PciDistressItem = serde_json::from_str(json).unwrap();
        let fresh = PciDistressItem::new(PciDistressType::Potholes, Severity::Medium, 2.0, 232.0);
        assert_eq!(item, fresh);
    }

    #[test]
    fn test_cdv_iteration_reduces_one_value_per_pass() {
        let (max_cdv, iterations) = max_corrected_deduct(&[40.0, 25.0, 10.0, 1.5]);
        // 1.5 is discarded; three significant values
        assert_eq!(iterations.len(), 3);
        assert_eq!(iterations[0].q, 3);
        assert!((iterations[0].total_deduct - 75.0).abs() < 1e-12);
        assert_eq!(iterations[1].q, 2);
        assert!((iterations[1].total_deduct - 37.0).abs() < 1e-12);
        assert_eq!(iterations[2].q, 1);
        assert!((iterations[2].total_deduct - 14.0).abs() < 1e-12);
        // last pass is uncorrected
        assert!((iterations[2].corrected_deduct - 14.0).abs() < 1e-12);

        let best = iterations
            .iter()
            .map(|i| i.corrected_deduct)
            .fold(0.0, f64::max);
        assert_eq!(max_cdv, best);
    }

    #[test]
    fn test_cdv_iteration_terminates_within_len() {
        let deducts: Vec<f64> = (0..30).map(|i| 3.0 + i as f64 * 2.5).collect();
        let (max_cdv, iterations) = max_corrected_deduct(&deducts);
        assert!(iterations.len() <= deducts.len());
        assert!((0.0..=100.0).contains(&max_cdv));
    }

    #[test]
    fn test_correction_factor_bounds() {
        assert_eq!(corrected_deduct_value(0.0, 3), 0.0);
        assert_eq!(corrected_deduct_value(50.0, 1), 50.0);
        let corrected = corrected_deduct_value(100.0, 4);
        assert!(corrected < 100.0 && corrected >= 10.0);
        assert_eq!(corrected_deduct_value(400.0, 1), 100.0);
        // factor floor of 0.1
        assert!((corrected_deduct_value(3.0, 7) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_pci_bounded_for_heavy_distress() {
        let calculator = PciCalculator::new(185.0);
        let observations: Vec<_> = PciDistressType::ALL
            .iter()
            .map(|t| (*t, Severity::High, 150.0))
            .collect();
        let result = calculator.calculate(&observations);
        assert!(result.pci <= 100);
        assert!(result.iterations.len() <= observations.len());
    }

    #[test]
    fn test_multiple_moderate_distresses() {
        let calculator = PciCalculator::new(232.0);
        let result = calculator.calculate(&[
            (PciDistressType::LongitudinalTransverseCracking, Severity::Medium, 20.0),
            (PciDistressType::Patching, Severity::Low, 10.0),
            (PciDistressType::WeatheringRaveling, Severity::Medium, 30.0),
        ]);
        assert!(result.pci > 0 && result.pci < 100);
        assert_eq!(result.rating, PciRating::from_score(result.pci));
        assert_eq!(result.breakdown.len(), 3);
    }

    #[test]
    fn test_rating_bands() {
        assert_eq!(PciRating::from_score(100), PciRating::Excellent);
        assert_eq!(PciRating::from_score(86), PciRating::Excellent);
        assert_eq!(PciRating::from_score(85), PciRating::VeryGood);
        assert_eq!(PciRating::from_score(71), PciRating::VeryGood);
        assert_eq!(PciRating::from_score(70), PciRating::Good);
        assert_eq!(PciRating::from_score(56), PciRating::Good);
        assert_eq!(PciRating::from_score(55), PciRating::Fair);
        assert_eq!(PciRating::from_score(41), PciRating::Fair);
        assert_eq!(PciRating::from_score(40), PciRating::Poor);
        assert_eq!(PciRating::from_score(26), PciRating::Poor);
        assert_eq!(PciRating::from_score(25), PciRating::VeryPoor);
        assert_eq!(PciRating::from_score(11), PciRating::VeryPoor);
        assert_eq!(PciRating::from_score(10), PciRating::Failed);
        assert_eq!(PciRating::from_score(0), PciRating::Failed);
        assert!(!PciRating::Failed.recommended_action().is_empty());
    }

    #[test]
    fn test_average_pci() {
        assert_eq!(average_pci(&[]), 0);
        assert_eq!(average_pci(&[100, 50, 51]), 67);
        assert_eq!(average_pci(&[100]), 100);
    }
}
