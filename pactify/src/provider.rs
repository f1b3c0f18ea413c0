use crate::contract::Contract;
use crate::data::RequestData;
use crate::error::Error;
use crate::http_client::{HttpClient, HyperHttpClient};
use crate::interaction::Interaction;
use crate::matcher::{match_value, Matcher, Mismatch};
use crate::report::{CandidateMismatch, UnmatchedRequest, VerificationFailure};
use serde_json::Value;
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Replays every interaction of a contract against a real provider and
/// checks each response with the matcher engine. This is the provider half
/// of verification; the mock server covers the consumer half.
#[derive(Debug)]
pub struct ProviderVerifier {
    base_url: String,
    http_client: Arc<dyn HttpClient + Send + Sync>,
}

impl ProviderVerifier {
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        Self {
            base_url: base_url.into(),
            http_client: Arc::new(HyperHttpClient::new()),
        }
    }

    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient + Send + Sync>) -> Self {
        self.http_client = http_client;
        self
    }

    /// Verify the whole contract; failures across interactions are
    /// aggregated into a single report.
    pub fn verify(&self, contract: &Contract) -> Result<(), Error> {
        let runtime = Runtime::new().map_err(|e| Error::Startup(e.to_string()))?;
        let mut unmatched = Vec::new();

        for interaction in &contract.interactions {
            let mismatches = self.verify_interaction(&runtime, interaction);
            if !mismatches.is_empty() {
                log::warn!(
                    "provider diverges from '{}' ({} mismatch(es))",
                    interaction.description,
                    mismatches.len()
                );
                unmatched.push(UnmatchedRequest {
                    method: interaction.method().into(),
                    path: interaction.path().raw().into(),
                    candidates: vec![CandidateMismatch {
                        description: interaction.description.clone(),
                        mismatches,
                    }],
                });
            }
        }

        if unmatched.is_empty() {
            Ok(())
        } else {
            Err(Error::ProviderVerification(VerificationFailure {
                unexercised: Vec::new(),
                unmatched,
            }))
        }
    }

    fn verify_interaction(&self, runtime: &Runtime, interaction: &Interaction) -> Vec<Mismatch> {
        let spec = &interaction.request;
        if spec.path.has_placeholders() {
            // a placeholder carries no example value, so there is nothing
            // concrete to send
            return vec![Mismatch {
                path: "$.path".into(),
                expected: "a replayable path without placeholders".into(),
                actual: spec.path.raw().into(),
            }];
        }

        let request = RequestData {
            method: spec.method.clone(),
            path: spec.path.raw().into(),
            query: spec.query.clone(),
            headers: spec
                .headers
                .iter()
                .map(|(name, matcher)| (name.clone(), header_example(matcher)))
                .collect(),
            body: spec
                .body
                .as_ref()
                .map(|matcher| matcher.example_value().to_string())
                .unwrap_or_default(),
        };

        let response = match runtime.block_on(self.http_client.execute(&self.base_url, &request)) {
            Ok(response) => response,
            Err(e) => {
                return vec![Mismatch {
                    path: "$".into(),
                    expected: "a reachable provider".into(),
                    actual: e.to_string(),
                }]
            }
        };

        let mut mismatches = Vec::new();
        let expected = &interaction.response;

        if response.status != expected.status {
            mismatches.push(Mismatch {
                path: "$.status".into(),
                expected: expected.status.to_string(),
                actual: response.status.to_string(),
            });
        }

        for (name, expected_value) in &expected.headers {
            match response.headers.get(name) {
                Some(actual) if actual == expected_value => {}
                Some(actual) => mismatches.push(Mismatch {
                    path: format!("$.headers.{}", name),
                    expected: expected_value.clone(),
                    actual: actual.clone(),
                }),
                None => mismatches.push(Mismatch {
                    path: format!("$.headers.{}", name),
                    expected: expected_value.clone(),
                    actual: "missing".into(),
                }),
            }
        }

        if let Some(expected_body) = &expected.body {
            match serde_json::from_str::<Value>(&response.body) {
                Ok(actual) => mismatches.extend(match_value(
                    expected_body,
                    &actual,
                    "$",
                    &expected.matching_rules,
                )),
                Err(e) => mismatches.push(Mismatch {
                    path: "$".into(),
                    expected: "a JSON response body".into(),
                    actual: e.to_string(),
                }),
            }
        }

        mismatches
    }
}

fn header_example(matcher: &Matcher) -> String {
    match matcher.example_value() {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
