//! Client for the Pandora REST API.
//!
//! One HTTP round trip per call, blocking, no retries: transient failures
//! are surfaced immediately so callers can pick their own retry policy.

use crate::error::{Error, Result};
use reqwest::{
    blocking::{multipart, Client, Response},
    header, StatusCode,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::{collections::HashMap, fmt, fs, path::Path, time::Duration};

#[derive(Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

/// Handle on a submitted analysis task. The seed is a capability token:
/// it must accompany every status query for this task.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub task_id: String,
    pub seed: String,
    #[serde(default)]
    pub link: Option<String>,
}

/// Task lifecycle as reported by the service. Vocabulary the service may
/// grow later maps to `Unknown` instead of failing the decode.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(from = "String")]
pub enum TaskState {
    Waiting,
    Running,
    Finished,
    Error,
    Unknown(String),
}

impl From<String> for TaskState {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "waiting" => TaskState::Waiting,
            "running" => TaskState::Running,
            "finished" => TaskState::Finished,
            "error" => TaskState::Error,
            _ => TaskState::Unknown(value),
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Waiting => write!(f, "waiting"),
            TaskState::Running => write!(f, "running"),
            TaskState::Finished => write!(f, "finished"),
            TaskState::Error => write!(f, "error"),
            TaskState::Unknown(other) => write!(f, "{other}"),
        }
    }
}

/// Fresh snapshot of one task, never cached. The body on the wire does
/// not repeat the task id, so the client echoes the queried one.
#[derive(Debug, Clone)]
pub struct TaskStatus {
    pub task_id: String,
    pub state: TaskState,
    pub workers: Option<HashMap<String, WorkerReport>>,
}

/// Report of a single analysis worker. The worker name is the key of the
/// enclosing map; the detail payload is opaque to the client.
#[derive(Deserialize, Debug, Clone)]
pub struct WorkerReport {
    pub status: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
    #[serde(flatten)]
    pub findings: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize, Debug)]
struct RedisUpResponse {
    up: bool,
}

#[derive(Deserialize, Debug)]
struct TaskStatusResponse {
    state: TaskState,
    #[serde(default)]
    workers: Option<HashMap<String, WorkerReport>>,
}

impl ApiClient {
    pub fn new(url: &str, apikey: Option<&str>, timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            client: ApiClient::build_client(apikey, timeout)?,
            base_url: ApiClient::normalize_url(url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether the instance answers at all. Connection failures yield
    /// `false`, never an error.
    pub fn is_up(&self) -> bool {
        self.client
            .head(&self.base_url)
            .send()
            .map(|response| response.status() == StatusCode::OK)
            .unwrap_or(false)
    }

    /// Whether the queue/store backing the instance is reachable.
    pub fn redis_up(&self) -> Result<bool> {
        let response: RedisUpResponse = read_json(self.get("redis_up", &[])?)?;
        Ok(response.up)
    }

    /// Submit a file from disk for analysis. `seed_expire` is the seed
    /// validity in seconds; 0 means the seed never expires.
    pub fn submit_file(&self, path: &Path, seed_expire: Option<u64>) -> Result<SubmissionResult> {
        let bytes = fs::read(path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => Error::FileUnreadable {
                path: path.to_path_buf(),
                source,
            },
        })?;
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload.bin");

        self.submit_bytes(bytes, filename, seed_expire)
    }

    /// Submit an in-memory file under an explicit filename.
    pub fn submit_bytes(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        seed_expire: Option<u64>,
    ) -> Result<SubmissionResult> {
        log::debug!("Submitting {filename} ({} bytes)...", bytes.len());

        let part = multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = multipart::Form::new().part("file", part);

        let mut request = self
            .client
            .post(format!("{}/submit", self.base_url))
            .multipart(form);
        if let Some(validity) = seed_expire {
            request = request.query(&[("validity", validity.to_string())]);
        }

        let response = request
            .send()
            .map_err(|e| Error::ServiceUnreachable(e.to_string()))?;
        let mut submission: SubmissionResult = read_json(response)?;
        if let Some(link) = submission.link.take() {
            submission.link = Some(self.resolve_link(link));
        }
        Ok(submission)
    }

    /// Status of one task. The seed must still be valid at query time; it
    /// is optional when the session is authenticated with an API key.
    pub fn task_status(
        &self,
        task_id: &str,
        seed: Option<&str>,
        details: bool,
    ) -> Result<TaskStatus> {
        let mut query = Vec::new();
        if let Some(seed) = seed {
            query.push(("seed", seed.to_string()));
        }
        query.push(("details", flag(details).to_string()));

        let response = self.get(&format!("task/{task_id}/status"), &query)?;
        match response.status().as_u16() {
            404 => {
                return Err(Error::TaskNotFound {
                    task_id: task_id.to_string(),
                })
            }
            401 | 403 => {
                return Err(Error::Unauthorized {
                    task_id: task_id.to_string(),
                })
            }
            _ => {}
        }

        let body: TaskStatusResponse = read_json(response)?;
        Ok(TaskStatus {
            task_id: task_id.to_string(),
            state: body.state,
            workers: body.workers,
        })
    }

    /// Status of a single worker, or of every worker. Exactly one of
    /// `worker_name` and `all_workers` must be chosen; both or neither is
    /// rejected before any request is made.
    pub fn worker_status(
        &self,
        worker_name: Option<&str>,
        all_workers: bool,
        details: bool,
    ) -> Result<HashMap<String, WorkerReport>> {
        match (worker_name, all_workers) {
            (Some(_), true) => {
                return Err(Error::InvalidArguments(
                    "worker_name and all_workers are mutually exclusive".into(),
                ))
            }
            (None, false) => {
                return Err(Error::InvalidArguments(
                    "either worker_name or all_workers is required".into(),
                ))
            }
            _ => {}
        }

        let mut query = Vec::new();
        if let Some(name) = worker_name {
            query.push(("worker", name.to_string()));
        }
        query.push(("all", flag(all_workers).to_string()));
        query.push(("details", flag(details).to_string()));

        read_json(self.get("workers/status", &query)?)
    }

    /// Names of the workers enabled on the instance.
    pub fn enabled_workers(&self) -> Result<Vec<String>> {
        read_json(self.get("api/enabled_workers", &[])?)
    }

    fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response> {
        self.client
            .get(format!("{}/{}", self.base_url, path))
            .query(query)
            .send()
            .map_err(|e| Error::ServiceUnreachable(e.to_string()))
    }

    fn resolve_link(&self, link: String) -> String {
        if link.contains("://") {
            link
        } else {
            format!("{}/{}", self.base_url, link.trim_start_matches('/'))
        }
    }

    fn normalize_url(url: &str) -> String {
        let url = if url.contains("://") {
            url.to_string()
        } else {
            format!("http://{url}")
        };
        url.trim_end_matches('/').to_string()
    }

    fn build_client(apikey: Option<&str>, timeout: Option<Duration>) -> Result<Client> {
        let mut headers = header::HeaderMap::new();
        let user_agent = format!("pandora-client / {}", env!("CARGO_PKG_VERSION"));
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_str(&user_agent)
                .map_err(|e| Error::InvalidArguments(format!("invalid user agent: {e}")))?,
        );
        if let Some(apikey) = apikey {
            let mut auth_value = header::HeaderValue::from_str(apikey)
                .map_err(|e| Error::InvalidArguments(format!("invalid API key: {e}")))?;
            auth_value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, auth_value);
        }

        Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::ServiceUnreachable(format!("cannot build HTTP client: {e}")))
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|e| Error::ServiceUnreachable(e.to_string()))?;
    if !status.is_success() {
        return Err(Error::ServiceError {
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|e| Error::MalformedResponse(format!("{e}: {body}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Nothing listens on port 1: any accidental request surfaces as
    // ServiceUnreachable, so variant checks also prove no call was made.
    const DEAD_URL: &str = "http://127.0.0.1:1";

    #[test]
    fn scheme_and_trailing_slash_are_normalized() {
        let client = ApiClient::new("pandora.circl.lu/", None, None).unwrap();
        assert_eq!(client.base_url(), "http://pandora.circl.lu");

        let client = ApiClient::new("https://pandora.circl.lu", None, None).unwrap();
        assert_eq!(client.base_url(), "https://pandora.circl.lu");
    }

    #[test]
    fn worker_status_rejects_both_selectors() {
        let client = ApiClient::new(DEAD_URL, None, None).unwrap();
        match client.worker_status(Some("clamav"), true, false) {
            Err(Error::InvalidArguments(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn worker_status_rejects_missing_selector() {
        let client = ApiClient::new(DEAD_URL, None, None).unwrap();
        match client.worker_status(None, false, true) {
            Err(Error::InvalidArguments(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn missing_file_fails_without_network() {
        let client = ApiClient::new(DEAD_URL, None, None).unwrap();
        match client.submit_file(Path::new("/nonexistent/sample.bin"), None) {
            Err(Error::FileNotFound { path }) => {
                assert_eq!(path, Path::new("/nonexistent/sample.bin"))
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn task_state_vocabulary() {
        let state: TaskState = serde_json::from_str("\"finished\"").unwrap();
        assert_eq!(state, TaskState::Finished);

        let state: TaskState = serde_json::from_str("\"Waiting\"").unwrap();
        assert_eq!(state, TaskState::Waiting);

        let state: TaskState = serde_json::from_str("\"CLEAN\"").unwrap();
        assert_eq!(state, TaskState::Unknown("CLEAN".into()));
        assert_eq!(state.to_string(), "CLEAN");
    }

    #[test]
    fn submission_requires_task_id_and_seed() {
        assert!(serde_json::from_str::<SubmissionResult>(r#"{"taskId": "x"}"#).is_err());
        assert!(serde_json::from_str::<SubmissionResult>(r#"{"seed": "y"}"#).is_err());

        let submission: SubmissionResult =
            serde_json::from_str(r#"{"taskId": "x", "seed": "y"}"#).unwrap();
        assert_eq!(submission.task_id, "x");
        assert_eq!(submission.seed, "y");
        assert_eq!(submission.link, None);
    }

    #[test]
    fn worker_report_keeps_extra_findings() {
        let report: WorkerReport =
            serde_json::from_str(r#"{"status": "okay", "score": 3}"#).unwrap();
        assert_eq!(report.status, "okay");
        assert!(report.details.is_none());
        assert_eq!(report.findings["score"], serde_json::json!(3));
    }
}
