//! ============================================================================
//! Decision Engine - Thresholds for report and collection verification
//! ============================================================================

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::VerificationError;
use crate::types::{CollectionVerification, ReportVerification};

/// Report flow accepts at or above this confidence
pub const REPORT_CONFIDENCE_THRESHOLD: f64 = 0.6;

/// Collection flow accepts strictly above this confidence
pub const COLLECTION_CONFIDENCE_THRESHOLD: f64 = 0.6;

/// Waste type the model reports when it cannot classify the photo
pub const UNIDENTIFIED_WASTE: &str = "unidentified";

/// Smallest reward for a verified collection
pub const REWARD_MIN: u32 = 10;

/// Largest reward for a verified collection (inclusive)
pub const REWARD_MAX: u32 = 59;

/// Why a report verification was demoted to manual review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialReason {
    UnidentifiedWaste,
    LowConfidence,
}

impl PartialReason {
    pub fn message(&self) -> &'static str {
        match self {
            Self::UnidentifiedWaste => "Unable to identify waste type. Please manually specify.",
            Self::LowConfidence => "Low confidence detection. Please verify results.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision", content = "reason")]
pub enum ReportDecision {
    /// Form fields may be filled from the model's result
    Accepted,
    /// Usable only after manual correction
    Partial(PartialReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionDecision {
    Accepted,
    /// Thresholds not met; nothing may be persisted
    LowConfidenceRejected,
}

/// Low confidence and unresolved types demote to `Partial`; only an
/// out-of-range confidence is a hard failure.
pub fn decide_report(result: &ReportVerification) -> Result<ReportDecision, VerificationError> {
    if !(0.0..=1.0).contains(&result.confidence) {
        return Err(VerificationError::MalformedResponse(format!(
            "'confidence' {} outside [0, 1]",
            result.confidence
        )));
    }

    if result.waste_type.trim().eq_ignore_ascii_case(UNIDENTIFIED_WASTE) {
        return Ok(ReportDecision::Partial(PartialReason::UnidentifiedWaste));
    }
    if result.confidence < REPORT_CONFIDENCE_THRESHOLD {
        return Ok(ReportDecision::Partial(PartialReason::LowConfidence));
    }
    Ok(ReportDecision::Accepted)
}

/// A confident type match stands in for an uncertain quantity match, so the
/// rule reduces to `wasteTypeMatch && confidence > 0.6`.
pub fn decide_collection(result: &CollectionVerification) -> CollectionDecision {
    let confident = result.confidence > COLLECTION_CONFIDENCE_THRESHOLD;
    let quantity_ok = result.quantity_match || (confident && result.waste_type_match);

    if result.waste_type_match && quantity_ok && confident {
        CollectionDecision::Accepted
    } else {
        CollectionDecision::LowConfidenceRejected
    }
}

/// Uniform reward in [REWARD_MIN, REWARD_MAX].
pub fn roll_reward<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    rng.gen_range(REWARD_MIN..=REWARD_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn report(waste_type: &str, confidence: f64) -> ReportVerification {
        ReportVerification {
            waste_type: waste_type.to_string(),
            quantity: "2kg".to_string(),
            confidence,
            description: "d".to_string(),
            recommendation: "r".to_string(),
        }
    }

    fn collection(waste_type_match: bool, quantity_match: bool, confidence: f64) -> CollectionVerification {
        CollectionVerification {
            waste_type_match,
            quantity_match,
            confidence,
        }
    }

    #[test]
    fn test_report_thresholds() {
        assert_eq!(decide_report(&report("plastic", 0.6)), Ok(ReportDecision::Accepted));
        assert_eq!(decide_report(&report("plastic", 1.0)), Ok(ReportDecision::Accepted));
        assert_eq!(
            decide_report(&report("plastic", 0.59)),
            Ok(ReportDecision::Partial(PartialReason::LowConfidence))
        );
        assert_eq!(
            decide_report(&report("plastic", 0.0)),
            Ok(ReportDecision::Partial(PartialReason::LowConfidence))
        );
    }

    #[test]
    fn test_report_unidentified_is_partial() {
        assert_eq!(
            decide_report(&report("unidentified", 0.95)),
            Ok(ReportDecision::Partial(PartialReason::UnidentifiedWaste))
        );
        assert_eq!(
            decide_report(&report("Unidentified", 0.2)),
            Ok(ReportDecision::Partial(PartialReason::UnidentifiedWaste))
        );
    }

    #[test]
    fn test_report_out_of_range_is_failure() {
        for c in [1.01, -0.5, f64::NAN] {
            assert!(decide_report(&report("plastic", c)).is_err());
        }
    }

    #[test]
    fn test_collection_rule_reduces_to_type_and_confidence() {
        for waste_type_match in [true, false] {
            for quantity_match in [true, false] {
                for confidence in [0.0, 0.3, 0.6, 0.61, 0.75, 0.9, 1.0] {
                    let expected = waste_type_match && confidence > 0.6;
                    let decision = decide_collection(&collection(waste_type_match, quantity_match, confidence));
                    assert_eq!(
                        decision == CollectionDecision::Accepted,
                        expected,
                        "type={} qty={} conf={}",
                        waste_type_match,
                        quantity_match,
                        confidence
                    );
                }
            }
        }
    }

    #[test]
    fn test_collection_scenarios() {
        assert_eq!(decide_collection(&collection(true, false, 0.75)), CollectionDecision::Accepted);
        assert_eq!(
            decide_collection(&collection(false, true, 0.9)),
            CollectionDecision::LowConfidenceRejected
        );
        // Threshold is exclusive
        assert_eq!(
            decide_collection(&collection(true, true, 0.6)),
            CollectionDecision::LowConfidenceRejected
        );
    }

    #[test]
    fn test_reward_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen_min = false;
        let mut seen_max = false;
        for _ in 0..5000 {
            let reward = roll_reward(&mut rng);
            assert!((REWARD_MIN..=REWARD_MAX).contains(&reward));
            seen_min |= reward == REWARD_MIN;
            seen_max |= reward == REWARD_MAX;
        }
        assert!(seen_min && seen_max);
    }

    #[test]
    fn test_partial_messages() {
        assert!(PartialReason::UnidentifiedWaste.message().contains("manually"));
        assert!(PartialReason::LowConfidence.message().contains("Low confidence"));
    }
}
