//! External arbitration of conflicts
//!
//! An [`Arbiter`] is asked to choose among the values a conflict's sources
//! reported, or to propose a compromise value. The resolver bounds every call
//! with a timeout and memoizes verdicts per conflict signature.

use super::{ConflictKind, ConflictValue, DetectedConflict};
use crate::error::{FusionError, Result};
use crate::types::{Confidence, Point2D};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Conflict as presented to an arbiter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArbitrationRequest {
    pub kind: ConflictKind,
    pub sources: Vec<String>,
    pub values: Vec<ConflictValue>,
    pub confidences: Vec<Confidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Point2D>,
}

impl ArbitrationRequest {
    /// Memoization key: identical kind, sources and values share a verdict
    pub fn signature(&self) -> String {
        let values: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        format!("{}|{}|{}", self.kind, self.sources.join(","), values.join(","))
    }
}

impl From<&DetectedConflict> for ArbitrationRequest {
    fn from(conflict: &DetectedConflict) -> Self {
        Self {
            kind: conflict.kind,
            sources: conflict.sources.clone(),
            values: conflict.values.clone(),
            confidences: conflict.confidences.clone(),
            location: conflict.location,
        }
    }
}

/// Arbiter decision
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ArbitrationDecision {
    /// Choose the value at `index` in the request
    Pick { index: usize },
    /// Use a value no source reported
    Compromise { value: ConflictValue },
}

/// Arbiter answer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ArbitrationVerdict {
    #[serde(flatten)]
    pub decision: ArbitrationDecision,
    pub confidence: Confidence,
}

/// External conflict arbiter
#[async_trait]
pub trait Arbiter: Send + Sync {
    /// Arbiter name for logs
    fn name(&self) -> &str;

    async fn arbitrate(&self, request: &ArbitrationRequest) -> Result<ArbitrationVerdict>;
}

/// Arbiter reached over HTTP: POSTs the request as JSON, expects a verdict
pub struct HttpArbiter {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpArbiter {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FusionError::Arbitration(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }
}

#[async_trait]
impl Arbiter for HttpArbiter {
    fn name(&self) -> &str {
        &self.endpoint
    }

    async fn arbitrate(&self, request: &ArbitrationRequest) -> Result<ArbitrationVerdict> {
        debug!("Requesting arbitration for {} conflict from {}", request.kind, self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| FusionError::Arbitration(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(FusionError::Arbitration(format!(
                "arbiter returned {}",
                response.status()
            )));
        }

        response
            .json::<ArbitrationVerdict>()
            .await
            .map_err(|e| FusionError::Arbitration(format!("invalid verdict: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RoomType;

    #[test]
    fn test_verdict_wire_format() {
        let verdict: ArbitrationVerdict =
            serde_json::from_str(r#"{"decision": "pick", "index": 1, "confidence": 0.8}"#).unwrap();
        assert_eq!(verdict.decision, ArbitrationDecision::Pick { index: 1 });

        let verdict: ArbitrationVerdict = serde_json::from_str(
            r#"{"decision": "compromise", "value": 3.2, "confidence": 0.6}"#,
        )
        .unwrap();
        assert_eq!(
            verdict.decision,
            ArbitrationDecision::Compromise {
                value: ConflictValue::Length(3.2)
            }
        );
    }

    #[test]
    fn test_signature_ignores_confidence() {
        let mut request = ArbitrationRequest {
            kind: ConflictKind::RoomType,
            sources: vec!["a".into(), "b".into()],
            values: vec![
                ConflictValue::RoomType(RoomType::Bedroom),
                ConflictValue::RoomType(RoomType::Office),
            ],
            confidences: vec![0.9, 0.6],
            location: None,
        };
        let before = request.signature();
        request.confidences = vec![0.5, 0.5];
        assert_eq!(request.signature(), before);
    }
}
