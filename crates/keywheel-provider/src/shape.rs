use keywheel_core::ResolvedCredential;
use serde_json::json;

use crate::vertex::{AuthError, VertexAuthenticator};

/// Public Generative Language endpoint for the free tier.
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// All categories opened up; filtering is the caller's editorial decision,
/// not a transport concern.
const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

const TEMPERATURE: f64 = 0.9;
const TOP_P: f64 = 0.95;

/// A fully shaped upstream call. Callers own the fetch and its error
/// handling; the only network behind this shape is token minting.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
}

impl ShapedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Shapes a generate-content call for whichever Gemini-family path the
/// credential belongs to. A credential carrying Vertex runtime facts goes
/// to the regional Vertex endpoint with a bearer header; anything else
/// goes to the public endpoint with the key as a query parameter.
pub async fn shape_generate(
    auth: &VertexAuthenticator,
    credential: &ResolvedCredential,
    model: &str,
    prompt: &str,
    stream: bool,
) -> Result<ShapedRequest, AuthError> {
    let verb = if stream {
        "streamGenerateContent"
    } else {
        "generateContent"
    };
    let body = generation_body(prompt);

    if let Some(runtime) = &credential.vertex {
        let token = auth.access_token_for_doc(&credential.secret).await?;
        let url = format!(
            "https://{location}-aiplatform.googleapis.com/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:{verb}",
            location = runtime.location,
            project = runtime.project_id,
        );
        return Ok(ShapedRequest {
            url,
            headers: vec![
                ("Authorization".to_string(), format!("Bearer {token}")),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body,
        });
    }

    let mut url = format!(
        "{GEMINI_BASE_URL}/models/{model}:{verb}?key={key}",
        key = urlencoding::encode(&credential.secret),
    );
    if stream {
        url.push_str("&alt=sse");
    }
    Ok(ShapedRequest {
        url,
        headers: vec![("Content-Type".to_string(), "application/json".to_string())],
        body,
    })
}

fn generation_body(prompt: &str) -> serde_json::Value {
    let safety: Vec<_> = SAFETY_CATEGORIES
        .iter()
        .map(|category| json!({ "category": category, "threshold": "BLOCK_NONE" }))
        .collect();
    json!({
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        "safetySettings": safety,
        "generationConfig": { "temperature": TEMPERATURE, "topP": TOP_P },
    })
}
