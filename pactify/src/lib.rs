//! Consumer-driven contract testing: a mock provider server that serves
//! registered request/response interactions, structural matchers for
//! comparing live requests against them, and lifecycle plumbing to verify
//! that every interaction a consumer declares is actually exercised. The
//! resulting contract can be replayed against a real provider.

mod config;
mod contract;
mod data;
mod error;
mod http_client;
mod interaction;
mod matcher;
mod mock_server;
mod provider;
mod registry;
mod report;
mod session;

pub use pactify_codegen::pact_session_test;

pub use config::{PactConfiguration, SessionMode};
pub use contract::Contract;
pub use data::{RequestData, ResponseData};
pub use error::Error;
pub use http_client::{HttpClient, HyperHttpClient};
pub use interaction::{Interaction, InteractionBuilder, PathPattern, RequestSpec, ResponseSpec};
pub use matcher::{
    each_like, each_like_min, like, match_value, term, Matcher, MatchingRules, Mismatch, Rule,
};
pub use mock_server::{MockServer, ServerState};
pub use provider::ProviderVerifier;
pub use registry::InteractionRegistry;
pub use report::{CandidateMismatch, UnmatchedRequest, VerificationFailure, VerificationReport};
pub use session::{Pact, DEFAULT_GLOBAL_PORT};
