//! Wire frames pushed to a channel: one per project, or a single error notice.

use serde::Serialize;

use crate::error::{ErrorKind, FetchError};
use crate::github::fetcher::FetchResult;

/// Sent once per failed trigger instead of metrics.
///
/// Carries only the failure kind and a generic sentence; project-level
/// detail stays in the server log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorNotice {
    /// Always `"error"`.
    #[serde(rename = "type")]
    pub r#type: &'static str,
    /// Stable machine-readable failure kind.
    pub kind: ErrorKind,
    /// Human-readable summary.
    pub message: &'static str,
}

impl ErrorNotice {
    /// Notice for a failed fetch cycle.
    pub fn for_error(error: &FetchError) -> Self {
        let kind = error.kind();
        let message = match kind {
            ErrorKind::EmptyBatch => "No projects are configured.",
            ErrorKind::TransportError => "The metrics provider could not be reached.",
            ErrorKind::QueryError => "The metrics provider could not resolve every project.",
        };
        Self {
            r#type: "error",
            kind,
            message,
        }
    }
}

/// Text frames to send for one fetch outcome, in order.
pub fn frames_for(outcome: &FetchResult) -> Vec<String> {
    match outcome {
        Ok(metrics) => metrics
            .iter()
            .filter_map(|m| match serde_json::to_string(m) {
                Ok(frame) => Some(frame),
                Err(e) => {
                    log::error!("Failed to encode metrics for {}: {}", m.name, e);
                    None
                }
            })
            .collect(),
        Err(error) => match serde_json::to_string(&ErrorNotice::for_error(error)) {
            Ok(frame) => vec![frame],
            Err(e) => {
                log::error!("Failed to encode error notice: {}", e);
                Vec::new()
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projects::ProjectMetrics;

    #[test]
    fn test_one_frame_per_project() {
        let outcome: FetchResult = Ok(vec![
            ProjectMetrics { name: "hello".into(), stars: 5, forks: 1 },
            ProjectMetrics { name: "world".into(), stars: 9, forks: 2 },
        ]);
        assert_eq!(
            frames_for(&outcome),
            vec![
                r#"{"name":"hello","stars":5,"forks":1}"#.to_string(),
                r#"{"name":"world","stars":9,"forks":2}"#.to_string(),
            ]
        );
    }

    #[test]
    fn test_failure_is_a_single_notice_without_details() {
        let outcome: FetchResult = Err(FetchError::Query {
            details: vec!["Could not resolve to a Repository with the name 'octo/gone'.".into()],
            partial: vec![ProjectMetrics { name: "hello".into(), stars: 5, forks: 1 }],
        });
        let frames = frames_for(&outcome);
        assert_eq!(frames.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["kind"], "query_error");
        assert!(!frames[0].contains("octo/gone"));
        assert!(!frames[0].contains("hello"));
    }

    #[test]
    fn test_transport_kind_on_the_wire() {
        let outcome: FetchResult = Err(FetchError::Transport("operation timed out".into()));
        let value: serde_json::Value = serde_json::from_str(&frames_for(&outcome)[0]).unwrap();
        assert_eq!(value["kind"], "transport_error");
    }
}
