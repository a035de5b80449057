//! ============================================================================
//! Report Service - Verify a waste photo, then file the report
//! ============================================================================
//! An accepted verification fills the report from the model's answer. A
//! partial one may only be filed once the reporter supplies the waste type
//! and amount by hand.
//! ============================================================================

use std::sync::Arc;
use tracing::{info, warn};

use crate::db::{CollectionTask, NewReport, NotificationKind, Report, User, WasteDb};
use crate::types::WorkflowError;
use crate::verification::{EncodedImage, ReportAssessment, ReportDecision, VerificationError, Verifier};

/// Form input accompanying a report. Manual fields override the model's
/// answer and are mandatory when verification was only partial.
#[derive(Debug, Clone, Default)]
pub struct ReportDraft {
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub waste_type: Option<String>,
    pub amount: Option<String>,
}

pub struct ReportService {
    db: Arc<WasteDb>,
    verifier: Arc<Verifier>,
}

impl ReportService {
    pub fn new(db: Arc<WasteDb>, verifier: Arc<Verifier>) -> Self {
        Self { db, verifier }
    }

    /// Ask the model what the photo shows. Writes nothing.
    pub async fn verify_image(&self, image: &EncodedImage) -> Result<ReportAssessment, VerificationError> {
        self.verifier.verify_report(image).await
    }

    /// File a report (and its pending task) from a completed verification.
    pub fn submit(
        &self,
        reporter: &User,
        draft: ReportDraft,
        assessment: Option<&ReportAssessment>,
        image: &EncodedImage,
    ) -> Result<(Report, CollectionTask), WorkflowError> {
        let assessment = assessment.ok_or(WorkflowError::VerificationRequired)?;

        let location = draft.location.trim().to_string();
        if location.is_empty() {
            return Err(WorkflowError::MissingLocation);
        }
        let (latitude, longitude) = match (draft.latitude, draft.longitude) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => (lat, lng),
            _ => return Err(WorkflowError::MissingCoordinates),
        };

        let manual_type = non_empty(draft.waste_type);
        let manual_amount = non_empty(draft.amount);
        let result = &assessment.result;

        let (waste_type, amount) = match assessment.decision {
            ReportDecision::Accepted => (
                manual_type.unwrap_or_else(|| result.waste_type.clone()),
                manual_amount.unwrap_or_else(|| result.quantity.clone()),
            ),
            ReportDecision::Partial(_) => match (manual_type, manual_amount) {
                (Some(t), Some(a)) => (t, a),
                _ => return Err(WorkflowError::ManualFieldsRequired),
            },
        };

        let payload = serde_json::to_string(result)
            .map_err(|e| WorkflowError::Storage(format!("Failed to serialize verification: {}", e)))?;

        let (report, task) = self.db.create_report(NewReport {
            reporter_id: reporter.id,
            location,
            latitude,
            longitude,
            waste_type,
            amount,
            description: result.description.clone(),
            recommendation: result.recommendation.clone(),
            image_reference: Some(image.reference.clone()),
            verification_payload: Some(payload),
        })?;

        // Report is stored; a failed notice only logs
        if let Err(e) = self.db.create_notification(
            reporter.id,
            NotificationKind::Report,
            &format!("Report submitted: {} ({}) at {}", report.waste_type, report.amount, report.location),
        ) {
            warn!("Could not notify reporter {} about report {}: {}", reporter.id, report.id, e);
        }

        info!("Reporter {} filed report {}", reporter.id, report.id);
        Ok((report, task))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
