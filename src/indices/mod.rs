pub mod pci;
pub mod pci_tables;
pub mod sdi;

use serde::{Deserialize, Serialize};

pub use pci::{average_pci, CdvIteration, PciCalculator, PciDistressItem, PciRating, PciResult};
pub use pci_tables::{DistressUnit, PciDistressType};
pub use sdi::{SdiCalculator, SdiCategory, SdiDistressItem, SdiDistressType, SdiWeights};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Low, Severity::Medium, Severity::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// Condition index attached to a committed segment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum ConditionIndex {
    Sdi { score: u8, category: SdiCategory },
    Pci { score: u8, rating: PciRating },
}

impl ConditionIndex {
    pub fn score(&self) -> u8 {
        match self {
            ConditionIndex::Sdi { score, .. } | ConditionIndex::Pci { score, .. } => *score,
        }
    }
}
