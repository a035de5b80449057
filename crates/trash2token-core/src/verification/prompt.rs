//! ============================================================================
//! Verification Request Builder
//! ============================================================================
//! Builds the instruction text + inline image sent to the vision model.
//! Both prompts pin the exact JSON key set the parser validates.
//! ============================================================================

use super::image::EncodedImage;

/// Keys the report prompt asks for
pub const REPORT_KEYS: [&str; 5] = ["wasteType", "quantity", "confidence", "description", "recommendation"];

/// Keys the collection prompt asks for
pub const COLLECTION_KEYS: [&str; 3] = ["wasteTypeMatch", "quantityMatch", "confidence"];

const STRICT_JSON_RULES: &str = "Respond with STRICT JSON ONLY: a single JSON object with exactly the keys shown below.\n\
    Do NOT wrap the JSON in markdown code fences. Do NOT add any text, explanation or commentary before or after it.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Report,
    Collection,
}

/// Prompt + image ready for the vision model.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub kind: RequestKind,
    pub prompt: String,
    pub image: EncodedImage,
}

/// Request for classifying a newly reported waste photo.
pub fn build_report_request(image: EncodedImage) -> VerificationRequest {
    let prompt = format!(
        "You are an expert in waste management and recycling. Analyze this image and provide:\n\
        1. The type of waste (e.g., plastic, paper, glass, metal, organic, electronic, hazardous, mixed)\n\
        2. An estimate of the quantity or amount (in kg or liters)\n\
        3. Your confidence in this assessment as a number between 0 and 1\n\
        4. A brief description of what you see in the image\n\
        5. Recommendations for proper disposal or recycling\n\n\
        Guidelines:\n\
        - If the waste is packed in a bag, say what kind of bag (decomposable or not) and whether it holds waste.\n\
        - If the image is unclear or no waste is visible, set confidence to 0.\n\
        - If you cannot determine the type, or the image contains no waste, set wasteType to \"unidentified\".\n\
        - Name common items specifically (e.g., PET, cardboard); use a general type for mixed items (e.g., mixed waste).\n\
        - For hazardous, organic, electronic, recyclable or non-recyclable waste, give a specific type and the matching disposal or recycling method as the recommendation.\n\
        - Keep description and recommendation under 100 words each.\n\n\
        {rules}\n\
        {{\n  \"wasteType\": \"type of waste\",\n  \"quantity\": \"estimated quantity with unit\",\n  \"confidence\": 0.0,\n  \"description\": \"what you see\",\n  \"recommendation\": \"how to dispose of it\"\n}}",
        rules = STRICT_JSON_RULES,
    );

    VerificationRequest {
        kind: RequestKind::Report,
        prompt,
        image,
    }
}

/// Request for checking a collection photo against the reported waste.
pub fn build_collection_request(
    image: EncodedImage,
    expected_waste_type: &str,
    expected_amount: &str,
) -> VerificationRequest {
    let prompt = format!(
        "You are an expert in waste management and recycling. Analyze this image of collected waste and:\n\
        1. Classify the waste and confirm whether it matches the reported type: {waste_type}\n\
        2. Estimate the quantity visible and decide whether it matches the reported amount: {amount}\n\
        3. Give your confidence in this assessment as a number between 0 and 1\n\n\
        {rules}\n\
        {{\n  \"wasteTypeMatch\": true,\n  \"quantityMatch\": true,\n  \"confidence\": 0.0\n}}",
        waste_type = expected_waste_type,
        amount = expected_amount,
        rules = STRICT_JSON_RULES,
    );

    VerificationRequest {
        kind: RequestKind::Collection,
        prompt,
        image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verification::image::tests::png_bytes;

    fn image() -> EncodedImage {
        EncodedImage::from_bytes(&png_bytes()).unwrap()
    }

    #[test]
    fn test_report_prompt_pins_keys() {
        let request = build_report_request(image());
        assert_eq!(request.kind, RequestKind::Report);
        for key in REPORT_KEYS {
            assert!(request.prompt.contains(&format!("\"{}\"", key)), "missing {}", key);
        }
        assert!(request.prompt.contains("STRICT JSON"));
        assert!(request.prompt.contains("\"unidentified\""));
        assert!(request.prompt.contains("Do NOT wrap"));
    }

    #[test]
    fn test_collection_prompt_embeds_expectations() {
        let request = build_collection_request(image(), "glass", "3 bags");
        assert_eq!(request.kind, RequestKind::Collection);
        for key in COLLECTION_KEYS {
            assert!(request.prompt.contains(&format!("\"{}\"", key)), "missing {}", key);
        }
        assert!(request.prompt.contains("reported type: glass"));
        assert!(request.prompt.contains("reported amount: 3 bags"));
        assert!(!request.prompt.contains("\"wasteType\""));
    }
}
