pub mod backoff;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::core::error::ClientError;
use crate::core::vault::CredentialStore;
use self::backoff::BackoffPolicy;

/// Header carrying the raw credential on every request.
const API_KEY_HEADER: &str = "X-API-Key";

/// Shown when a job fails without a server-provided message.
const GENERIC_FAILURE: &str = "Job failed";

/// Per-request ceiling so a hung connection cannot stall the loop.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct SubmitRequest<'a> {
    prompt: &'a str,
    #[serde(rename = "threadId", skip_serializing_if = "Option::is_none")]
    thread_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct SubmitResponse {
    #[serde(rename = "jobId")]
    job_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// `completed` and `failed` are final; a job never leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// One poll response. The job is server-owned; this is a point-in-time view.
#[derive(Debug, Deserialize)]
pub struct JobSnapshot {
    pub status: JobStatus,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, rename = "threadId")]
    pub thread_id: Option<String>,
}

/// Final outcome of an executed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub text: String,
    /// Conversation-correlation token. Forward it on a follow-up `execute`
    /// to keep agent context across related commands.
    pub thread_id: Option<String>,
}

/// Client for the remote agent API: submits a natural-language instruction,
/// then polls the resulting job until it reaches a terminal state.
///
/// Each `execute` call is one independent sequential chain; calls may run
/// concurrently and share nothing mutable beyond the connection pool and
/// read-only vault access. Dropping the returned future cancels the poll
/// loop — no timer or lock is held across suspension points, so nothing
/// leaks and no stray error fires. The remote job itself cannot be
/// cancelled.
pub struct AgentClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<dyn CredentialStore>,
    policy: BackoffPolicy,
}

impl AgentClient {
    pub fn new(base_url: impl Into<String>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            store,
            policy: BackoffPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run `prompt` against the agent and wait for its final text.
    ///
    /// The credential is read from the store on every call (it may change
    /// between calls), the job is submitted once (never retried — a
    /// resubmission could duplicate a financial action), and the job is
    /// then polled under the backoff policy until `completed`, `failed`,
    /// or the attempt ceiling.
    pub async fn execute(
        &self,
        prompt: &str,
        thread_id: Option<&str>,
    ) -> Result<CommandOutcome, ClientError> {
        let api_key = self
            .store
            .get()
            .await?
            .ok_or(ClientError::MissingCredential)?;

        let job_id = self.submit(&api_key, prompt, thread_id).await?;
        info!(%job_id, "submitted agent job");

        for attempt in 0..self.policy.max_attempts() {
            tokio::time::sleep(self.policy.delay(attempt)).await;

            let snapshot = match self.poll(&api_key, &job_id).await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    // Reads are safe to retry; only the ceiling ends the loop.
                    debug!(%job_id, attempt, error = %err, "transient poll failure");
                    continue;
                }
            };

            match snapshot.status {
                JobStatus::Completed => {
                    info!(%job_id, attempt, "job completed");
                    return Ok(CommandOutcome {
                        text: render_result(snapshot.result),
                        thread_id: snapshot.thread_id,
                    });
                }
                JobStatus::Failed => {
                    let message = snapshot
                        .error
                        .unwrap_or_else(|| GENERIC_FAILURE.to_string());
                    info!(%job_id, attempt, "job failed");
                    return Err(ClientError::JobFailed(message));
                }
                JobStatus::Pending | JobStatus::Processing => {
                    debug!(%job_id, attempt, status = ?snapshot.status, "job still running");
                }
            }
        }

        Err(ClientError::TimedOut {
            attempts: self.policy.max_attempts(),
        })
    }

    async fn submit(
        &self,
        api_key: &str,
        prompt: &str,
        thread_id: Option<&str>,
    ) -> Result<String, ClientError> {
        let res = self
            .http
            .post(format!("{}/agent/prompt", self.base_url))
            .header(API_KEY_HEADER, api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&SubmitRequest { prompt, thread_id })
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(ClientError::Submission {
                status: res.status().as_u16(),
                body: res.text().await.unwrap_or_default(),
            });
        }

        let parsed: SubmitResponse = res.json().await?;
        Ok(parsed.job_id)
    }

    async fn poll(&self, api_key: &str, job_id: &str) -> Result<JobSnapshot, reqwest::Error> {
        let res = self
            .http
            .get(format!("{}/agent/job/{}", self.base_url, job_id))
            .header(API_KEY_HEADER, api_key)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        res.json().await
    }
}

/// Coerce a completed job's result to displayable text: strings pass
/// through, anything else is pretty-printed JSON, absence is empty.
fn render_result(result: Option<Value>) -> String {
    match result {
        None => String::new(),
        Some(Value::String(text)) => text,
        Some(other) => serde_json::to_string_pretty(&other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn render_passes_strings_through() {
        assert_eq!(render_result(Some(json!("you have $12.50"))), "you have $12.50");
    }

    #[test]
    fn render_pretty_prints_structured_values() {
        let value = json!({"markets": [{"id": "m1", "odds": 0.62}]});
        let text = render_result(Some(value.clone()));
        assert!(text.contains('\n'), "expected multi-line output, got {text:?}");
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn render_absent_result_is_empty() {
        assert_eq!(render_result(None), "");
    }

    #[test]
    fn status_parses_all_wire_values() {
        for (wire, expected) in [
            ("pending", JobStatus::Pending),
            ("processing", JobStatus::Processing),
            ("completed", JobStatus::Completed),
            ("failed", JobStatus::Failed),
        ] {
            let snapshot: JobSnapshot =
                serde_json::from_value(json!({ "status": wire })).unwrap();
            assert_eq!(snapshot.status, expected);
        }
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn submit_request_omits_absent_thread_id() {
        let body = serde_json::to_value(SubmitRequest {
            prompt: "what are my balances?",
            thread_id: None,
        })
        .unwrap();
        assert_eq!(body, json!({ "prompt": "what are my balances?" }));

        let body = serde_json::to_value(SubmitRequest {
            prompt: "and now?",
            thread_id: Some("t-1"),
        })
        .unwrap();
        assert_eq!(body, json!({ "prompt": "and now?", "threadId": "t-1" }));
    }

    #[test]
    fn snapshot_parses_full_poll_response() {
        let snapshot: JobSnapshot = serde_json::from_value(json!({
            "status": "completed",
            "result": {"balance": "42 USDC"},
            "threadId": "t-9"
        }))
        .unwrap();
        assert_eq!(snapshot.status, JobStatus::Completed);
        assert_eq!(snapshot.thread_id.as_deref(), Some("t-9"));
        assert!(snapshot.error.is_none());
    }
}
