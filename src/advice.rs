use crate::error::AppError;
use crate::gemini_types::{
    GeminiContent, GeminiPart, GeminiPayload, GeminiResponse, GenerationConfig,
};

use tracing::{debug, error, info, warn};

/// The three free-text fields of the medical form, trimmed and known to be non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct AdviceRequest {
    pub location: String,
    pub symptoms: String,
    pub language: String,
}

impl AdviceRequest {
    pub fn new(location: &str, symptoms: &str, language: &str) -> Result<Self, AppError> {
        let required = |value: &str, name: &str| {
            let value = value.trim();
            if value.is_empty() {
                Err(AppError::bad_request(format!("{name} is required")))
            } else {
                Ok(value.to_string())
            }
        };
        Ok(Self {
            location: required(location, "Location")?,
            symptoms: required(symptoms, "Medical issue")?,
            language: required(language, "Language")?,
        })
    }
}

pub fn build_prompt(request: &AdviceRequest) -> String {
    let AdviceRequest {
        location,
        symptoms,
        language,
    } = request;
    format!(
        "You are a careful healthcare assistant. A person has described their symptoms and \
needs guidance they can act on.

Patient details:
- Location: {location}
- Symptoms: {symptoms}
- Preferred language: {language}

First decide whether the symptoms could be life threatening (for example chest pain, trouble \
breathing, heavy bleeding, signs of stroke, fainting, a severe allergic reaction, poisoning or a \
serious head injury).

If they could be, begin with this section:
**EMERGENCY MEDICAL ATTENTION REQUIRED**
**WARNING:** Call emergency services (911 or the local emergency number) now.
**Suspected condition:** one or two sentences.
**While waiting for help:** a short bulleted list of safe first-aid steps.
**Do not:** a short bulleted list of things that could make it worse.

Otherwise answer with these sections:
**1. Likely condition:** what this probably is and why.
**2. Severity:** mild, moderate, or serious but not an emergency.
**3. Who to see:** the kind of provider and how soon, considering the patient's location.
**4. Relief now:** bulleted, specific self-care measures.
**5. Home care:** what to do over the next few days.
**6. Red flags:** start with **WARNING:** and list symptoms that mean going to an emergency room.
**7. Recovery and prevention:** expected timeline and how to avoid a recurrence.

Formatting rules:
- Section headers in **bold**.
- Bullet points start with \"* \".
- Any warning line contains \"WARNING:\" or \"EMERGENCY\".
- Leave a blank line between sections.
- Use plain words and explain medical terms.
- Write the whole answer in {language}."
    )
}

/// Canned advisory used whenever the generative backend cannot answer.
pub fn fallback_advice(symptoms: &str) -> String {
    format!(
        "**System Alert**

We are unable to provide personalized medical guidance right now because of a technical problem.

**Your reported symptoms:** {symptoms}

**WARNING:** If your symptoms are severe, do not wait for online guidance.
* Call emergency services (911 or your local emergency number) immediately for chest pain, \
difficulty breathing, severe bleeding, loss of consciousness or a severe allergic reaction.
* Otherwise, please consult a healthcare professional, visit an urgent care center, or call a \
medical helpline for an evaluation."
    )
}

#[derive(Clone)]
pub struct AdviceClient {
    http_client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl AdviceClient {
    pub fn new(http_client: reqwest::Client, api_key: &str, api_base: &str, model: &str) -> Self {
        Self {
            http_client,
            api_key: api_key.to_string(),
            api_base: api_base.to_string(),
            model: model.to_string(),
        }
    }

    /// Never fails: any backend problem downgrades to `fallback_advice`.
    pub async fn advise(&self, request: &AdviceRequest) -> String {
        let prompt = build_prompt(request);
        debug!(prompt_len = prompt.len(), "built advice prompt");
        match self.generate(&prompt).await {
            Ok(text) => {
                info!(response_len = text.len(), "got advice from Gemini");
                text
            }
            Err(e) => {
                warn!(error = %e, "advice generation failed; returning fallback");
                fallback_advice(&request.symptoms)
            }
        }
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, AppError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        );
        let payload = GeminiPayload {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: Some(0.4),
                ..Default::default()
            }),
        };
        let resp = self
            .http_client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "failed to send request to Gemini");
                AppError::from(e)
            })?;
        if let Some(err) = AppError::from_upstream_status(resp.status()) {
            warn!(status = %resp.status(), "Gemini answered with an error status");
            return Err(err);
        }
        if !resp.status().is_success() {
            warn!(status = %resp.status(), "Gemini rejected the request");
            return Err(AppError::UpstreamDataInvalid);
        }
        let resp = resp.json::<GeminiResponse>().await.map_err(|e| {
            error!(error = %e, "failed to deserialize Gemini response");
            AppError::UpstreamDataInvalid
        })?;
        if let Some(reason) = resp
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            warn!(reason, "Gemini blocked the prompt");
        }
        debug!(
            candidates = resp.candidates.len(),
            finish_reason = ?resp.candidates.first().and_then(|c| c.finish_reason.as_deref()),
            "Gemini answered"
        );
        resp.text().ok_or(AppError::UpstreamDataInvalid)
    }
}
