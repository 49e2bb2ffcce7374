use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::debug;

use crate::model::{Record, StepEntry};

pub const TEST_ID_FIELD: &str = "testCaseID";

const REST_PREFIX: &str = "polarion/rest/v1";

/// Implementations return the records matching `query`, at most `limit` of
/// them, in no particular order.
pub trait WorkItemSource {
    fn search(&mut self, query: &str, limit: usize) -> Result<Vec<Record>>;
}

pub fn build_id_query<S: AsRef<str>>(identifiers: &[S]) -> String {
    let joined = identifiers
        .iter()
        .map(|identifier| identifier.as_ref())
        .collect::<Vec<&str>>()
        .join(" ");
    format!("id:({joined})")
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

pub fn parse_credentials(raw: &str) -> Result<Credentials> {
    let normalized = raw.trim().replace('\'', "\"");
    let entries: BTreeMap<String, String> = serde_json::from_str(&normalized)
        .context("malformed credentials: expected {'user':'token'} or {'user':'token.txt'}")?;

    if entries.len() != 1 {
        bail!(
            "malformed credentials: expected exactly one user entry, found {}",
            entries.len()
        );
    }

    let Some((username, value)) = entries.into_iter().next() else {
        bail!("malformed credentials: no user entry");
    };

    let token = if value.contains(".txt") {
        fs::read_to_string(&value)
            .with_context(|| format!("failed to read token file: {value}"))?
            .trim()
            .to_string()
    } else {
        value.trim().to_string()
    };

    if username.trim().is_empty() || token.is_empty() {
        bail!("malformed credentials: user and token must be non-empty");
    }

    Ok(Credentials { username, token })
}

pub struct PolarionClient {
    http: Client,
    server_url: String,
    project: String,
    token: String,
}

impl PolarionClient {
    pub fn new(
        server_url: &str,
        project: &str,
        credentials: &Credentials,
        accept_invalid_certs: bool,
    ) -> Result<Self> {
        let http = Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            server_url: server_url.trim_end_matches('/').to_string(),
            project: project.to_string(),
            token: credentials.token.clone(),
        })
    }

    fn project_url(&self) -> String {
        format!("{}/{REST_PREFIX}/projects/{}", self.server_url, self.project)
    }

    fn get_json(&self, url: &str, params: &[(&str, String)]) -> Result<Value> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/json")
            .query(params)
            .send()
            .with_context(|| format!("request failed: {url}"))?
            .error_for_status()
            .with_context(|| format!("tracker rejected request: {url}"))?;

        response
            .json::<Value>()
            .with_context(|| format!("failed to decode response: {url}"))
    }

    fn fetch_steps(&self, work_item_id: &str) -> Result<Vec<StepEntry>> {
        let url = format!("{}/workitems/{work_item_id}/teststeps", self.project_url());
        let body = self.get_json(&url, &[("fields[teststeps]", "@all".to_string())])?;
        Ok(steps_from_response(&body))
    }
}

impl WorkItemSource for PolarionClient {
    fn search(&mut self, query: &str, limit: usize) -> Result<Vec<Record>> {
        let url = format!("{}/workitems", self.project_url());
        let params = [
            ("query", query.to_string()),
            ("page[size]", limit.to_string()),
            ("fields[workitems]", "@all".to_string()),
        ];
        let body = self.get_json(&url, &params)?;

        let resources = body
            .get("data")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut records = Vec::with_capacity(resources.len());
        for resource in resources.iter().take(limit) {
            let Some(mut record) = record_from_resource(resource) else {
                debug!(resource = %resource, "skipping work item without id");
                continue;
            };
            record.steps = self
                .fetch_steps(&record.id)
                .with_context(|| format!("failed to load test steps for {}", record.id))?;
            records.push(record);
        }

        Ok(records)
    }
}

fn record_from_resource(resource: &Value) -> Option<Record> {
    let raw_id = resource.get("id").and_then(Value::as_str)?;
    let id = raw_id.rsplit('/').next().unwrap_or(raw_id).to_string();
    if id.is_empty() {
        return None;
    }

    let attributes = resource.get("attributes");
    let attribute = |name: &str| {
        attributes
            .and_then(|attrs| attrs.get(name))
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
    };

    let author = resource
        .pointer("/relationships/author/data/id")
        .and_then(Value::as_str)
        .map(|author| author.rsplit('/').next().unwrap_or(author).to_string())
        .unwrap_or_default();

    Some(Record {
        id,
        title: attribute("title").unwrap_or_default(),
        type_tag: attribute("type").unwrap_or_default(),
        author,
        status: attribute("status").unwrap_or_default(),
        test_id: attribute(TEST_ID_FIELD),
        steps: Vec::new(),
    })
}

fn steps_from_response(body: &Value) -> Vec<StepEntry> {
    let Some(steps) = body.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };

    steps
        .iter()
        .map(|step| {
            let keys = step
                .pointer("/attributes/keys")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let values = step
                .pointer("/attributes/values")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            keys.iter()
                .enumerate()
                .filter_map(|(idx, key)| {
                    let key = key.as_str()?;
                    let value = values
                        .get(idx)
                        .and_then(|value| value.get("value"))
                        .and_then(Value::as_str)
                        .map(ToOwned::to_owned);
                    Some((key.to_string(), value))
                })
                .collect::<StepEntry>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn build_id_query_joins_identifiers_in_one_predicate() {
        assert_eq!(build_id_query(&["AP-1", "AP-2", "AP-3"]), "id:(AP-1 AP-2 AP-3)");
        assert_eq!(build_id_query(&["AP-9"]), "id:(AP-9)");
    }

    #[test]
    fn parse_credentials_accepts_single_quoted_mapping() {
        let credentials = parse_credentials("{'jdoe':'secret'}").expect("valid credentials");
        assert_eq!(credentials.username, "jdoe");
        assert_eq!(credentials.token, "secret");
        assert!(!format!("{credentials:?}").contains("secret"));
    }

    #[test]
    fn parse_credentials_reads_token_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let token_path = dir.path().join("token.txt");
        fs::write(&token_path, "from-file\n").expect("write token");

        let raw = format!("{{'jdoe':'{}'}}", token_path.display());
        let credentials = parse_credentials(&raw).expect("token file credentials");
        assert_eq!(credentials.token, "from-file");
    }

    #[test]
    fn parse_credentials_rejects_malformed_structures() {
        assert!(parse_credentials("jdoe:secret").is_err());
        assert!(parse_credentials("{}").is_err());
        assert!(parse_credentials("{'a':'1','b':'2'}").is_err());
        assert!(parse_credentials("{'jdoe':''}").is_err());
    }

    #[test]
    fn record_from_resource_maps_attributes_and_author() {
        let resource = json!({
            "type": "workitems",
            "id": "PROJ/AP-1",
            "attributes": {
                "title": "Foo",
                "type": "testcase",
                "status": "approved",
                "testCaseID": "AP-1.AP-1 - Foo"
            },
            "relationships": {
                "author": { "data": { "type": "users", "id": "jdoe" } }
            }
        });

        let record = record_from_resource(&resource).expect("record");
        assert_eq!(record.id, "AP-1");
        assert_eq!(record.title, "Foo");
        assert_eq!(record.type_tag, "testcase");
        assert_eq!(record.author, "jdoe");
        assert_eq!(record.status, "approved");
        assert_eq!(record.test_id.as_deref(), Some("AP-1.AP-1 - Foo"));
    }

    #[test]
    fn record_from_resource_leaves_missing_test_id_absent() {
        let resource = json!({ "id": "PROJ/AP-2", "attributes": { "type": "requirement" } });
        let record = record_from_resource(&resource).expect("record");
        assert!(record.test_id.is_none());
        assert_eq!(record.author, "");
    }

    #[test]
    fn steps_from_response_pairs_keys_with_values() {
        let body = json!({
            "data": [{
                "attributes": {
                    "keys": ["step", "expectedResult"],
                    "values": [
                        { "type": "text/html", "value": "<p>Press</p>" }
                    ]
                }
            }]
        });

        let steps = steps_from_response(&body);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0]["step"].as_deref(), Some("<p>Press</p>"));
        assert_eq!(steps[0]["expectedResult"], None);
    }
}
