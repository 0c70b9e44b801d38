//! Prompts for the two analysis passes.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth**: tuning what the model is asked to extract
//!    or how cautiously it must phrase conclusions requires editing exactly
//!    one place.
//!
//! 2. **Testability**: unit tests can inspect the rendered prompts directly
//!    without calling a model, so a lost safety instruction is caught early.

/// Token in [`SYNTHESIS_PROMPT`] replaced by the synthesis basis text.
pub const BASIS_PLACEHOLDER: &str = "[PLACEHOLDER_FOR_INITIAL_ANALYSIS_OR_FULL_TEXT]";

/// Token in [`EXTRACTION_PROMPT`] replaced by the document's full text.
pub const TEXT_PLACEHOLDER: &str = "[EXTRACTED_TEXT]";

/// Logged and reported when the structured-extraction pass fails and the
/// synthesis pass falls back to the raw document text.
pub const FALLBACK_NOTICE: &str = "Could not pre-process text. Using raw text for synthesis.";

/// System message sent with both passes.
pub const SYSTEM_PROMPT: &str = "You are a careful assistant that reads medical and laboratory \
reports and explains them in plain language. You never diagnose and never prescribe.";

/// Pass 1: structured extraction from the raw text.
pub const EXTRACTION_PROMPT: &str = r#"Analyze the following report text extracted from a PDF.
Identify key sections (e.g., Blood Report, Lipid Profile, Liver Function, Imaging Findings).
For each numerical result found (like blood counts, cholesterol levels, enzyme levels, etc.), extract:
- Test Name
- Value
- Unit (if available)
- Reference Range (if available in the text)
Summarize any textual findings, especially from imaging sections if present in the text.

Extracted Text:
---
[EXTRACTED_TEXT]
---

Output the findings in a structured manner (e.g., using Markdown lists or sections)."#;

/// Pass 2: synthesis over the pass-1 summary (or the raw text) and any images.
pub const SYNTHESIS_PROMPT: &str = r#"You are an AI assistant analyzing medical report data.
Based *only* on the information provided below (extracted text summary and any associated images), perform the following:

1.  **Summarize Key Findings:** Briefly list the most significant results (both numerical and textual/visual). Mention if values are outside typical reference ranges if that information is available or commonly known (state typical ranges if possible).
2.  **Explain Significance:** For key abnormal findings, explain what they *might* indicate in simple terms.
3.  **Potential Conditions (General):** Based on the *combination* of findings, list *potential* conditions or areas of concern that *might* be associated with these results. Use cautious language (e.g., "could suggest," "may indicate," "warrants further investigation").
4.  **General Recommendations & Next Steps:** Suggest general, non-specific lifestyle advice (like diet, hydration, exercise) that might be relevant *if applicable and safe*. More importantly, strongly recommend discussing these results in detail with a qualified healthcare professional for accurate diagnosis and treatment planning. Mention specific results they should discuss.

**IMPORTANT:**
* **DO NOT PROVIDE A DIAGNOSIS.** You are not a doctor.
* **DO NOT PROVIDE MEDICAL ADVICE.** All recommendations must be general and emphasize consultation with a doctor.
* Clearly state that this analysis is based solely on the provided data and may be incomplete or require clinical context.
* If the report seems incomplete or unclear, state that.

Use the following extracted information and images (if any) for your analysis.

**Extracted Text Summary/Details:**
[PLACEHOLDER_FOR_INITIAL_ANALYSIS_OR_FULL_TEXT]

**[If Images Exist]:** Analyze the provided images in conjunction with the text. Describe any visual findings."#;

/// Build the pass-1 prompt around the document's full text.
pub fn extraction_prompt(full_text: &str) -> String {
    EXTRACTION_PROMPT.replacen(TEXT_PLACEHOLDER, full_text, 1)
}

/// Build the pass-2 prompt around the synthesis basis.
pub fn synthesis_prompt(basis: &str) -> String {
    SYNTHESIS_PROMPT.replacen(BASIS_PLACEHOLDER, basis, 1)
}
