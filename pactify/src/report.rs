use crate::matcher::Mismatch;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;

/// Why one registered interaction rejected a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMismatch {
    pub description: String,
    pub mismatches: Vec<Mismatch>,
}

/// A request the mock server could not match against any interaction,
/// with the full reasons per considered candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedRequest {
    pub method: String,
    pub path: String,
    pub candidates: Vec<CandidateMismatch>,
}

impl Display for UnmatchedRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.candidates.is_empty() {
            write!(f, "{} {}: no interaction registered for this request", self.method, self.path)
        } else {
            writeln!(f, "{} {}:", self.method, self.path)?;
            for candidate in &self.candidates {
                writeln!(f, "  against '{}':", candidate.description)?;
                for mismatch in &candidate.mismatches {
                    writeln!(f, "    {}", mismatch)?;
                }
            }
            Ok(())
        }
    }
}

/// Built while a scenario runs: which interactions were registered, how often
/// each was exercised, and every request that failed to match. Consulted at
/// verify-time; updates happen under the mock server's state lock so
/// concurrent matching requests each count exactly once.
#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    registered: Vec<String>,
    exercised: HashMap<usize, usize>,
    unmatched: Vec<UnmatchedRequest>,
}

impl VerificationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_registered<S: Into<String>>(&mut self, description: S) {
        self.registered.push(description.into());
    }

    pub(crate) fn mark_exercised(&mut self, index: usize) {
        *self.exercised.entry(index).or_insert(0) += 1;
    }

    pub(crate) fn record_unmatched(&mut self, unmatched: UnmatchedRequest) {
        self.unmatched.push(unmatched);
    }

    pub(crate) fn clear(&mut self) {
        self.registered.clear();
        self.exercised.clear();
        self.unmatched.clear();
    }

    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }

    pub fn times_exercised(&self, index: usize) -> usize {
        self.exercised.get(&index).copied().unwrap_or(0)
    }

    pub fn unmatched_requests(&self) -> &[UnmatchedRequest] {
        &self.unmatched
    }

    /// Descriptions of interactions exercised fewer than `min` times, in
    /// registration order.
    pub fn unexercised(&self, min: usize) -> Vec<String> {
        self.registered
            .iter()
            .enumerate()
            .filter(|(index, _)| self.times_exercised(*index) < min)
            .map(|(_, description)| description.clone())
            .collect()
    }

    /// The scenario passes only when every registered interaction was
    /// exercised at least `min` times and no request went unmatched.
    pub fn failure(&self, min: usize) -> Option<VerificationFailure> {
        let unexercised = self.unexercised(min);
        if unexercised.is_empty() && self.unmatched.is_empty() {
            None
        } else {
            Some(VerificationFailure {
                unexercised,
                unmatched: self.unmatched.clone(),
            })
        }
    }
}

/// Aggregate verification failure: every interaction never (or insufficiently)
/// exercised and every unmatched request with its mismatch reasons.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationFailure {
    pub unexercised: Vec<String>,
    pub unmatched: Vec<UnmatchedRequest>,
}

impl Display for VerificationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.unexercised.is_empty() {
            writeln!(f, "interactions never exercised:")?;
            for description in &self.unexercised {
                writeln!(f, "  - {}", description)?;
            }
        }
        if !self.unmatched.is_empty() {
            writeln!(f, "unmatched requests:")?;
            for unmatched in &self.unmatched {
                writeln!(f, "  - {}", unmatched)?;
            }
        }
        Ok(())
    }
}
