//! Client for the height estimation backend.
//!
//! The backend does all the real work: it finds the two people in the photo,
//! scales the child against the reference person and draws the boxes. This
//! module only packages requests and interprets the answers.

use std::time::Duration;

use chrono::NaiveDateTime;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::camera::CapturedPhoto;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::session::{AnnotatedImage, EstimationResult, ReferenceHeight};
use crate::tilt::{self, TiltReading};

const ESTIMATE_PATH: &str = "estimate-child-height";
const SAVE_MEASUREMENT_PATH: &str = "measure/save";
const HISTORY_PATH: &str = "measure/height";

/// Message used when the backend fails without saying why.
const DEFAULT_ESTIMATE_FAILURE: &str = "height estimation failed";
const DEFAULT_SAVE_FAILURE: &str = "saving the measurement failed";

/// Everything the backend needs for one estimate.
#[derive(Debug, Clone)]
pub struct EstimationRequest {
    /// The photo to analyze.
    pub photo: CapturedPhoto,
    /// Known height of the adult in the photo.
    pub reference_height: ReferenceHeight,
    /// Tilt at the moment of capture.
    pub tilt: Option<TiltReading>,
}

/// A measurement to persist for a child profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SaveMeasurementRequest {
    /// Child profile the measurement belongs to.
    pub kid_info_no: u64,
    /// Height in centimeters.
    pub height_cm: f64,
}

#[derive(Debug, Serialize)]
struct SaveMeasurementBody {
    kid_info_no: u64,
    measure_height: String,
}

impl From<&SaveMeasurementRequest> for SaveMeasurementBody {
    fn from(request: &SaveMeasurementRequest) -> Self {
        Self {
            kid_info_no: request.kid_info_no,
            measure_height: format!("{:.1}", request.height_cm),
        }
    }
}

/// A stored measurement, as listed by the history endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    /// Row id.
    pub measure_no: u64,
    /// Family the measurement belongs to.
    pub family_no: u64,
    /// Height as stored, in centimeters.
    #[serde(default)]
    pub measure_height: Option<String>,
    /// When it was recorded.
    #[serde(default)]
    pub measure_regist_at: Option<NaiveDateTime>,
}

impl MeasurementRecord {
    /// Stored height as a number, if it is one.
    #[must_use]
    pub fn height_cm(&self) -> Option<f64> {
        self.measure_height
            .as_deref()
            .and_then(|h| h.trim().parse::<f64>().ok())
            .filter(|h| h.is_finite())
    }
}

#[derive(Debug, Deserialize)]
struct EstimateResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    child_height_cm: Option<f64>,
    #[serde(default)]
    annotated_image: Option<String>,
    #[serde(default)]
    distance_dad_cm: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SaveResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Interpret the body of an estimate response.
///
/// The backend answers rejections with a 4xx status and `success: false`,
/// so the body is interpreted regardless of the status code.
///
/// # Errors
///
/// Returns [`Error::BackendRejected`] for `success: false` and
/// [`Error::MalformedResponse`] for anything unusable.
pub fn parse_estimate_response(body: &str) -> Result<EstimationResult> {
    let response: EstimateResponse = serde_json::from_str(body)
        .map_err(|e| Error::malformed(format!("estimate response is not JSON: {e}")))?;

    if !response.success {
        let message = response
            .error
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ESTIMATE_FAILURE.to_string());
        return Err(Error::rejected(message));
    }

    let child_height_cm = response
        .child_height_cm
        .filter(|h| h.is_finite() && *h > 0.0)
        .ok_or_else(|| Error::malformed("missing or invalid child_height_cm"))?;
    let encoded = response
        .annotated_image
        .ok_or_else(|| Error::malformed("missing annotated_image"))?;
    let annotated_image = AnnotatedImage::from_base64(&encoded)
        .map_err(|e| Error::malformed(format!("annotated_image: {e}")))?;

    Ok(EstimationResult {
        child_height_cm,
        annotated_image,
        reference_distance_cm: response.distance_dad_cm,
    })
}

/// Interpret the body of a save response.
///
/// # Errors
///
/// Returns [`Error::Save`] unless the body reports success.
pub fn parse_save_response(body: &str) -> Result<()> {
    let response: SaveResponse = serde_json::from_str(body)
        .map_err(|e| Error::save("measurement", format!("unreadable response: {e}")))?;
    if response.success {
        Ok(())
    } else {
        Err(Error::save(
            "measurement",
            response
                .error
                .unwrap_or_else(|| DEFAULT_SAVE_FAILURE.to_string()),
        ))
    }
}

/// The remote service behind the capture flow.
#[async_trait::async_trait]
pub trait EstimationBackend: Send + Sync {
    /// Estimate the child's height from a photo.
    ///
    /// # Errors
    ///
    /// Returns a network, timeout, rejection or malformed-response error.
    async fn estimate(&self, request: &EstimationRequest) -> Result<EstimationResult>;

    /// Persist a measurement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Save`] if the measurement was not stored.
    async fn save_measurement(&self, request: &SaveMeasurementRequest) -> Result<()>;

    /// List stored measurements of a family, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a network or malformed-response error.
    async fn measurement_history(&self, family_no: u64) -> Result<Vec<MeasurementRecord>>;
}

/// [`EstimationBackend`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
    upload_timeout: Duration,
    request_timeout: Duration,
}

impl HttpBackend {
    /// Create a client for the backend described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn new(config: &Config) -> Result<Self> {
        let mut base_url = Url::parse(&config.backend.base_url).map_err(|e| {
            Error::ConfigValidation {
                message: format!("invalid backend base_url: {e}"),
            }
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("glowfam/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            upload_timeout: config.upload_timeout(),
            request_timeout: config.request_timeout(),
        })
    }

    /// Base URL all endpoints are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::internal(format!("bad endpoint {path}: {e}")))
    }
}

fn transport_error(err: reqwest::Error, operation: &str) -> Error {
    if err.is_timeout() {
        Error::Timeout {
            operation: operation.to_string(),
        }
    } else {
        Error::Network(err)
    }
}

#[async_trait::async_trait]
impl EstimationBackend for HttpBackend {
    async fn estimate(&self, request: &EstimationRequest) -> Result<EstimationResult> {
        let url = self.endpoint(ESTIMATE_PATH)?;
        let image = Part::bytes(request.photo.bytes.clone())
            .file_name(request.photo.upload_file_name())
            .mime_str("image/jpeg")?;
        let form = Form::new()
            .text("ref_height", request.reference_height.to_form_value())
            .text("camera_pitch", tilt::form_value(request.tilt))
            .part("image", image);

        debug!(
            %url,
            bytes = request.photo.len(),
            reference_cm = request.reference_height.cm(),
            "Uploading photo for estimation"
        );
        let response = self
            .client
            .post(url)
            .multipart(form)
            .timeout(self.upload_timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, "photo upload"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(e, "photo upload"))?;
        debug!(%status, len = body.len(), "Estimation response received");

        let result = parse_estimate_response(&body);
        match &result {
            Ok(estimate) => info!(height_cm = estimate.child_height_cm, "Estimated child height"),
            Err(e) => warn!(%status, "Estimation failed: {e}"),
        }
        result
    }

    async fn save_measurement(&self, request: &SaveMeasurementRequest) -> Result<()> {
        let url = self.endpoint(SAVE_MEASUREMENT_PATH)?;
        let body = SaveMeasurementBody::from(request);
        debug!(%url, kid_info_no = body.kid_info_no, height = %body.measure_height, "Saving measurement");

        let response = self
            .client
            .post(url)
            .json(&body)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| Error::save("measurement", transport_error(e, "save").to_string()))?;
        let text = response
            .text()
            .await
            .map_err(|e| Error::save("measurement", e.to_string()))?;

        parse_save_response(&text)
    }

    async fn measurement_history(&self, family_no: u64) -> Result<Vec<MeasurementRecord>> {
        let url = self.endpoint(HISTORY_PATH)?;
        let records: Vec<MeasurementRecord> = self
            .client
            .get(url)
            .query(&[("family_no", family_no)])
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, "history"))?
            .error_for_status()?
            .json()
            .await?;

        let total = records.len();
        let usable: Vec<_> = records
            .into_iter()
            .filter(|r| r.height_cm().is_some())
            .collect();
        if usable.len() < total {
            debug!(
                skipped = total - usable.len(),
                "Dropped measurements without a numeric height"
            );
        }
        Ok(usable)
    }
}
