use crate::settings::AnalysisSettings;
use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use url::Url;

pub const ANALYZE_PROMPT: &str = "You are an expert image analyst. Analyze the following image and \
identify its key components. Specifically, determine if the image contains sky, trees, green land, \
or water. Provide a general description and set the boolean flags accordingly. Respond with a JSON \
object with the fields description, hasSky, hasTrees, hasGreenLand and hasWater.";

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeImageInput {
    pub image_url: String,
}

impl AnalyzeImageInput {
    pub fn new(image_url: impl Into<String>) -> Result<Self> {
        let input = Self {
            image_url: image_url.into(),
        };
        input.parsed_url()?;
        Ok(input)
    }

    pub fn parsed_url(&self) -> Result<Url> {
        Url::parse(&self.image_url).with_context(|| format!("invalid image url {}", self.image_url))
    }
}

/// Every field is required; a response missing one is rejected whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeImageOutput {
    pub description: String,
    pub has_sky: bool,
    pub has_trees: bool,
    pub has_green_land: bool,
    pub has_water: bool,
}

pub trait ImageAnalyzer {
    fn analyze(&self, input: &AnalyzeImageInput) -> Result<AnalyzeImageOutput>;
}

/// Hosted vision model reached through the `generateContent` REST call.
pub struct GeminiAnalyzer {
    client: Client,
    endpoint: Url,
    model: String,
    api_key: String,
}

impl GeminiAnalyzer {
    pub fn new(endpoint: &str, model: &str, api_key: impl Into<String>) -> Result<Self> {
        let endpoint =
            Url::parse(endpoint).with_context(|| format!("invalid analysis endpoint {endpoint}"))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent("layer-studio image analysis")
            .build()
            .context("build analysis http client")?;
        Ok(Self {
            client,
            endpoint,
            model: model.to_string(),
            api_key: api_key.into(),
        })
    }

    /// Reads the API key from the environment variable named in `settings`.
    pub fn from_settings(settings: &AnalysisSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env)
            .with_context(|| format!("read api key from ${}", settings.api_key_env))?;
        Self::new(&settings.endpoint, &settings.model, api_key)
    }

    pub fn request_url(&self) -> Result<Url> {
        self.endpoint
            .join(&format!("v1beta/models/{}:generateContent", self.model))
            .context("build generateContent url")
    }
}

impl ImageAnalyzer for GeminiAnalyzer {
    fn analyze(&self, input: &AnalyzeImageInput) -> Result<AnalyzeImageOutput> {
        let url = self.request_url()?;
        let body = serde_json::to_vec(&build_request_body(input)?)
            .context("serialize analysis request")?;
        tracing::debug!(model = %self.model, "sending image analysis request");

        let resp = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, self.api_key.as_str())
            .body(body)
            .send()
            .context("send analysis request")?;
        let status = resp.status();
        let text = resp.text().context("read analysis response")?;
        if !status.is_success() {
            bail!("analysis request failed with {status}: {}", text.trim());
        }
        let output = parse_response(&text)?;
        tracing::info!(
            has_sky = output.has_sky,
            has_trees = output.has_trees,
            has_green_land = output.has_green_land,
            has_water = output.has_water,
            "image analysed"
        );
        Ok(output)
    }
}

/// Request payload: the prompt plus the image, inlined for data URLs and
/// referenced by URI otherwise.
pub fn build_request_body(input: &AnalyzeImageInput) -> Result<serde_json::Value> {
    let url = input.parsed_url()?;
    let image_part = if url.scheme() == "data" {
        let (meta, payload) = url
            .path()
            .split_once(',')
            .ok_or_else(|| anyhow!("data url has no payload"))?;
        let mime_type = meta
            .strip_suffix(";base64")
            .ok_or_else(|| anyhow!("data url must be base64 encoded"))?;
        json!({ "inlineData": { "mimeType": mime_type, "data": payload } })
    } else {
        json!({ "fileData": { "mimeType": guess_mime_type(&url), "fileUri": url.as_str() } })
    };

    Ok(json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": ANALYZE_PROMPT }, image_part],
        }],
        "generationConfig": { "responseMimeType": "application/json" },
    }))
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

/// Extracts the structured output from a `generateContent` response body.
pub fn parse_response(body: &str) -> Result<AnalyzeImageOutput> {
    let response: GenerateContentResponse =
        serde_json::from_str(body).context("deserialize generateContent response")?;
    let text = response
        .candidates
        .into_iter()
        .flat_map(|candidate| candidate.content.parts)
        .find_map(|part| part.text)
        .ok_or_else(|| anyhow!("analysis response has no text output"))?;
    serde_json::from_str(strip_code_fence(&text)).context("analysis output does not match schema")
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

fn guess_mime_type(url: &Url) -> &'static str {
    let path = url.path().to_ascii_lowercase();
    if path.ends_with(".jpg") || path.ends_with(".jpeg") {
        "image/jpeg"
    } else if path.ends_with(".webp") {
        "image/webp"
    } else if path.ends_with(".gif") {
        "image/gif"
    } else {
        "image/png"
    }
}
