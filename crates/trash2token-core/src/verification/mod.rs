//! ============================================================================
//! Verification Module - Photo checks via an external vision model
//! ============================================================================
//! Pipeline: image encode -> prompt -> model call -> parse/validate -> decide.
//! - image: photo to base64 + MIME payload
//! - prompt: strict-JSON instruction text for both flows
//! - client: `VisionModel` seam, Gemini client, timeout wrapper
//! - parser: JSON extraction and schema validation
//! - decision: thresholds and reward rolls
//! ============================================================================

mod client;
mod decision;
mod image;
mod parser;
mod prompt;

pub use client::{
    GeminiVisionClient, VerificationClient, VisionModel, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS,
    GEMINI_API_BASE,
};
pub use decision::{
    decide_collection, decide_report, roll_reward, CollectionDecision, PartialReason,
    ReportDecision, COLLECTION_CONFIDENCE_THRESHOLD, REPORT_CONFIDENCE_THRESHOLD, REWARD_MAX,
    REWARD_MIN, UNIDENTIFIED_WASTE,
};
pub use image::{image_reference, sniff_mime, EncodedImage, ImageError, MAX_IMAGE_BYTES};
pub use parser::{extract_json_object, parse_collection_response, parse_report_response};
pub use prompt::{
    build_collection_request, build_report_request, RequestKind, VerificationRequest,
    COLLECTION_KEYS, REPORT_KEYS,
};

use serde::Serialize;
use tracing::{info, warn};

use crate::types::{CollectionVerification, ReportVerification};

/// Message shown for any failed verification attempt
pub const RETRY_MESSAGE: &str = "Verification failed. Please try again.";

/// Why a verification attempt produced no usable result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VerificationError {
    /// The model call did not complete (timeout, connection, HTTP error)
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// The call completed but the text does not satisfy the schema
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl VerificationError {
    pub fn user_message(&self) -> &'static str {
        RETRY_MESSAGE
    }
}

/// Parsed report result plus the decision taken on it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportAssessment {
    pub result: ReportVerification,
    pub decision: ReportDecision,
}

/// Parsed collection result plus the decision taken on it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionAssessment {
    pub result: CollectionVerification,
    pub decision: CollectionDecision,
}

/// Runs both verification flows against one injected client.
/// Pure with respect to storage: persisting is the caller's job.
#[derive(Clone)]
pub struct Verifier {
    client: VerificationClient,
}

impl Verifier {
    pub fn new(client: VerificationClient) -> Self {
        Self { client }
    }

    pub async fn verify_report(&self, image: &EncodedImage) -> Result<ReportAssessment, VerificationError> {
        let request = build_report_request(image.clone());
        let raw = self.client.request(&request).await?;

        let result = parse_report_response(&raw).inspect_err(|e| warn!("Report verification rejected: {}", e))?;
        let decision = decide_report(&result)?;

        info!(
            "Report verification: {} ({}%) -> {:?}",
            result.waste_type,
            result.confidence_percent(),
            decision
        );
        Ok(ReportAssessment { result, decision })
    }

    pub async fn verify_collection(
        &self,
        image: &EncodedImage,
        expected_waste_type: &str,
        expected_amount: &str,
    ) -> Result<CollectionAssessment, VerificationError> {
        let request = build_collection_request(image.clone(), expected_waste_type, expected_amount);
        let raw = self.client.request(&request).await?;

        let result = parse_collection_response(&raw).inspect_err(|e| warn!("Collection verification rejected: {}", e))?;
        let decision = decide_collection(&result);

        info!(
            "Collection verification: type={} quantity={} confidence={:.2} -> {:?}",
            result.waste_type_match, result.quantity_match, result.confidence, decision
        );
        Ok(CollectionAssessment { result, decision })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Verifiers backed by canned model behaviour, shared by workflow tests.

    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    pub(crate) use super::client::tests::{OfflineModel, SlowModel, StaticModel};
    pub(crate) use super::image::tests::png_bytes;

    pub(crate) fn verifier_answering(text: &str) -> Verifier {
        Verifier::new(VerificationClient::new(
            Arc::new(StaticModel(text.to_string())),
            Duration::from_secs(1),
        ))
    }

    pub(crate) fn slow_verifier() -> Verifier {
        Verifier::new(VerificationClient::new(Arc::new(SlowModel), Duration::from_millis(20)))
    }

    pub(crate) fn offline_verifier() -> Verifier {
        Verifier::new(VerificationClient::new(Arc::new(OfflineModel), Duration::from_secs(1)))
    }

    pub(crate) fn test_image() -> EncodedImage {
        EncodedImage::from_bytes(&png_bytes()).unwrap()
    }
}
