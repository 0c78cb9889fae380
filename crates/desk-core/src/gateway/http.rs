//! HTTP implementation of the remote gateway against the `/api/v1` REST API.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{GatewayError, RemoteGateway};
use crate::models::{CreatedRecord, ProcessingOptions, RemoteSnapshot, RemoteStatus};
use crate::util::{compact_text, is_http_url, normalize_text_option};

/// Gateway that speaks to the DecisionDesk backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGateway {
    /// Builds a gateway for an explicit API base URL (including `/api/v1`).
    ///
    /// `timeout` bounds every request; an expired timeout counts as an
    /// indeterminate delivery.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let base_url = normalize_base_url(base_url.into().as_str())?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|error| {
                GatewayError::InvalidConfiguration(format!(
                    "Failed to construct HTTP client: {error}"
                ))
            })?;
        Ok(Self { base_url, client })
    }

    /// Returns the base URL this gateway was configured with.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probes `GET /health`; any 2xx answer means the backend is reachable.
    pub async fn health(&self) -> Result<(), GatewayError> {
        let response = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .map_err(classify_transport_error)?;
        ensure_success(response).await.map(|_| ())
    }

    fn url(&self, route: &str) -> String {
        format!("{}{route}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, route: &str) -> Result<T, GatewayError> {
        let response = self
            .client
            .get(self.url(route))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(classify_transport_error)?;
        read_json(ensure_success(response).await?).await
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn create_record(&self) -> Result<CreatedRecord, GatewayError> {
        let response = self
            .client
            .post(self.url("/meetings"))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(classify_transport_error)?;
        let created: CreateMeetingResponse = read_json(ensure_success(response).await?).await?;
        Ok(CreatedRecord {
            remote_id: created.id,
            created_at: created.created_at.timestamp_millis(),
        })
    }

    async fn upload_asset(
        &self,
        remote_id: &str,
        recording_ref: &str,
    ) -> Result<RemoteStatus, GatewayError> {
        let path = recording_path(recording_ref);
        let bytes = tokio::fs::read(path).await.map_err(|error| {
            GatewayError::MissingAsset(format!("{}: {error}", path.display()))
        })?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("recording.m4a")
            .to_string();
        let mime = mime_guess::from_path(path).first_or_octet_stream();

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime.essence_str())
            .map_err(|error| GatewayError::InvalidConfiguration(error.to_string()))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.url(&format!("/meetings/{remote_id}/audio")))
            .header(reqwest::header::ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await
            .map_err(classify_transport_error)?;
        let uploaded: UploadAudioResponse = read_json(ensure_success(response).await?).await?;
        tracing::debug!(
            "Uploaded audio for {remote_id} (asset {})",
            uploaded.asset_id.as_deref().unwrap_or("-")
        );
        Ok(uploaded.status)
    }

    async fn fetch_details(&self, remote_id: &str) -> Result<RemoteSnapshot, GatewayError> {
        let details: MeetingDetailsResponse =
            self.get_json(&format!("/meetings/{remote_id}")).await?;
        Ok(details.into())
    }

    async fn request_processing(
        &self,
        remote_id: &str,
        options: &ProcessingOptions,
    ) -> Result<RemoteStatus, GatewayError> {
        let body = TranscribeRequest {
            provider: options.provider.as_str(),
            model: options.model.as_str(),
            enable_diarization: options.enable_diarization,
        };
        let response = self
            .client
            .post(self.url(&format!("/meetings/{remote_id}/transcribe")))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;
        let accepted: TranscribeResponse = read_json(ensure_success(response).await?).await?;
        Ok(accepted.status)
    }

    async fn list_records(&self) -> Result<Vec<RemoteSnapshot>, GatewayError> {
        let summaries: Vec<MeetingSummaryResponse> = self.get_json("/meetings").await?;
        Ok(summaries.into_iter().map(Into::into).collect())
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateMeetingResponse {
    id: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadAudioResponse {
    #[serde(default)]
    asset_id: Option<String>,
    status: RemoteStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranscribeRequest {
    provider: &'static str,
    model: &'static str,
    enable_diarization: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscribeResponse {
    status: RemoteStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeetingDetailsResponse {
    id: String,
    status: RemoteStatus,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    duration_sec: Option<i64>,
    #[serde(default)]
    minutes: Option<f64>,
    #[serde(default)]
    transcript: Option<TranscriptBody>,
    #[serde(default)]
    cost: Option<CostBody>,
}

#[derive(Debug, Deserialize)]
struct TranscriptBody {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CostBody {
    #[serde(default)]
    whisper: Option<WhisperCost>,
    #[serde(default)]
    total: Option<TotalCost>,
}

#[derive(Debug, Deserialize)]
struct WhisperCost {
    #[serde(default)]
    minutes: Option<f64>,
    #[serde(default)]
    usd: Option<f64>,
    #[serde(default)]
    brl: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TotalCost {
    #[serde(default)]
    usd: Option<f64>,
    #[serde(default)]
    brl: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeetingSummaryResponse {
    id: String,
    status: RemoteStatus,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    duration_sec: Option<i64>,
    #[serde(default)]
    minutes: Option<f64>,
}

impl From<MeetingDetailsResponse> for RemoteSnapshot {
    fn from(details: MeetingDetailsResponse) -> Self {
        let cost = details.cost.unwrap_or_default();
        let whisper = cost.whisper.as_ref();
        let total = cost.total.as_ref();
        let (language, transcript_text) = details
            .transcript
            .map_or((None, None), |t| (t.language, t.text));

        Self {
            id: details.id,
            status: details.status,
            created_at: details.created_at.map(|at| at.timestamp_millis()),
            title: normalize_text_option(details.title),
            duration_sec: details.duration_sec,
            transcript_text,
            language,
            cost_usd: whisper
                .and_then(|w| w.usd)
                .or_else(|| total.and_then(|t| t.usd)),
            cost_brl: whisper
                .and_then(|w| w.brl)
                .or_else(|| total.and_then(|t| t.brl)),
            minutes: whisper.and_then(|w| w.minutes).or(details.minutes),
        }
    }
}

impl From<MeetingSummaryResponse> for RemoteSnapshot {
    fn from(summary: MeetingSummaryResponse) -> Self {
        Self {
            created_at: summary.created_at.map(|at| at.timestamp_millis()),
            title: normalize_text_option(summary.title),
            duration_sec: summary.duration_sec,
            minutes: summary.minutes,
            ..Self::bare(summary.id, summary.status)
        }
    }
}

// ---------------------------------------------------------------------------
// Private
// ---------------------------------------------------------------------------

fn normalize_base_url(raw: &str) -> Result<String, GatewayError> {
    let value = normalize_text_option(Some(raw.to_string())).ok_or_else(|| {
        GatewayError::InvalidConfiguration("API base URL is required".to_string())
    })?;
    if !is_http_url(&value) {
        return Err(GatewayError::InvalidConfiguration(
            "API base URL must include http:// or https://".to_string(),
        ));
    }
    Ok(value.trim_end_matches('/').to_string())
}

/// Local filesystem path for a recording reference (plain path or `file://` URL)
fn recording_path(recording_ref: &str) -> &Path {
    Path::new(
        recording_ref
            .strip_prefix("file://")
            .unwrap_or(recording_ref),
    )
}

fn classify_transport_error(error: reqwest::Error) -> GatewayError {
    if error.is_connect() {
        GatewayError::Unreachable(error.to_string())
    } else {
        GatewayError::Indeterminate(error.to_string())
    }
}

fn classify_status(status: StatusCode, body: &str) -> GatewayError {
    let message = compact_text(body);
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        GatewayError::Indeterminate(format!("HTTP {}: {message}", status.as_u16()))
    } else {
        GatewayError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, &body))
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
    let body = response
        .text()
        .await
        .map_err(|error| GatewayError::Indeterminate(error.to_string()))?;
    serde_json::from_str(&body).map_err(|error| {
        GatewayError::InvalidPayload(format!("{error}: {}", compact_text(&body)))
    })
}
