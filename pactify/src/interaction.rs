use crate::error::Error;
use crate::matcher::{Matcher, MatchingRules, Rule};
use std::collections::BTreeMap;
use std::fmt::Display;

/// A request path made of literal segments and `{name}` placeholders. A
/// placeholder matches any single non-empty segment.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<PathSegment>,
}

#[derive(Debug, Clone, PartialEq)]
enum PathSegment {
    Literal(String),
    Placeholder(String),
}

impl PathPattern {
    pub fn parse<S: Into<String>>(raw: S) -> Self {
        let raw = raw.into();
        let segments = raw
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|segment| {
                if segment.starts_with('{') && segment.ends_with('}') && segment.len() > 2 {
                    PathSegment::Placeholder(segment[1..segment.len() - 1].into())
                } else {
                    PathSegment::Literal(segment.into())
                }
            })
            .collect();

        Self { raw, segments }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn has_placeholders(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, PathSegment::Placeholder(_)))
    }

    pub fn matches(&self, actual: &str) -> bool {
        let actual_segments: Vec<&str> = actual.split('/').filter(|s| !s.is_empty()).collect();
        if actual_segments.len() != self.segments.len() {
            return false;
        }

        self.segments
            .iter()
            .zip(&actual_segments)
            .all(|(expected, actual)| match expected {
                PathSegment::Literal(s) => s == actual,
                PathSegment::Placeholder(_) => !actual.is_empty(),
            })
    }
}

impl Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// The expected shape of an incoming request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub method: String,
    pub path: PathPattern,
    pub query: Option<String>,
    pub headers: BTreeMap<String, Matcher>,
    pub body: Option<Matcher>,
    pub matching_rules: MatchingRules,
}

impl RequestSpec {
    pub fn new<M: Into<String>, P: Into<String>>(method: M, path: P) -> Self {
        Self {
            method: method.into().to_uppercase(),
            path: PathPattern::parse(path),
            query: None,
            headers: BTreeMap::new(),
            body: None,
            matching_rules: MatchingRules::new(),
        }
    }

    pub fn with_query<S: Into<String>>(mut self, query: S) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_header<N: Into<String>, M: Into<Matcher>>(mut self, name: N, value: M) -> Self {
        self.headers.insert(name.into().to_lowercase(), value.into());
        self
    }

    pub fn with_body<M: Into<Matcher>>(mut self, body: M) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_matching_rule<P: Into<String>>(mut self, path: P, rule: Rule) -> Self {
        self.matching_rules.add(path, rule);
        self
    }
}

/// The canned response returned when the request shape matches.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSpec {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Matcher>,
    pub matching_rules: MatchingRules,
}

impl ResponseSpec {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: None,
            matching_rules: MatchingRules::new(),
        }
    }

    pub fn with_header<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.headers.insert(name.into().to_lowercase(), value.into());
        self
    }

    pub fn with_body<M: Into<Matcher>>(mut self, body: M) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_matching_rule<P: Into<String>>(mut self, path: P, rule: Rule) -> Self {
        self.matching_rules.add(path, rule);
        self
    }
}

/// One expected request/response pair. Immutable once registered.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    pub provider_state: Option<String>,
    pub description: String,
    pub request: RequestSpec,
    pub response: ResponseSpec,
}

impl Interaction {
    /// Start building an interaction, pact-style:
    /// `Interaction::upon_receiving("a request for all products")
    ///     .given("products exist")
    ///     .with_request(..)
    ///     .will_respond_with(..)`.
    pub fn upon_receiving<S: Into<String>>(description: S) -> InteractionBuilder {
        InteractionBuilder {
            description: description.into(),
            provider_state: None,
            request: None,
        }
    }

    pub fn method(&self) -> &str {
        &self.request.method
    }

    pub fn path(&self) -> &PathPattern {
        &self.request.path
    }

    /// Registration-time validation; faults here are fatal to the scenario.
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.description.is_empty() {
            return Err(Error::Registration("description must not be empty".into()));
        }
        if self.request.method.is_empty() {
            return Err(Error::Registration("request method must not be empty".into()));
        }
        if !self.request.path.raw().starts_with('/') {
            return Err(Error::Registration(format!(
                "request path '{}' must start with '/'",
                self.request.path
            )));
        }

        for (name, matcher) in &self.request.headers {
            matcher.validate().map_err(|e| {
                Error::Registration(format!("header '{}' matcher: {}", name, e))
            })?;
        }
        if let Some(body) = &self.request.body {
            body.validate()
                .map_err(|e| Error::Registration(format!("request body matcher: {}", e)))?;
        }
        if let Some(body) = &self.response.body {
            body.validate()
                .map_err(|e| Error::Registration(format!("response body matcher: {}", e)))?;
        }
        self.request
            .matching_rules
            .validate()
            .map_err(|e| Error::Registration(format!("request matching rules: {}", e)))?;
        self.response
            .matching_rules
            .validate()
            .map_err(|e| Error::Registration(format!("response matching rules: {}", e)))?;

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct InteractionBuilder {
    description: String,
    provider_state: Option<String>,
    request: Option<RequestSpec>,
}

impl InteractionBuilder {
    pub fn given<S: Into<String>>(mut self, provider_state: S) -> Self {
        self.provider_state = Some(provider_state.into());
        self
    }

    pub fn with_request(mut self, request: RequestSpec) -> Self {
        self.request = Some(request);
        self
    }

    /// Completes the interaction. A missing request defaults to `GET /`;
    /// registration validates the final shape.
    pub fn will_respond_with(self, response: ResponseSpec) -> Interaction {
        Interaction {
            provider_state: self.provider_state,
            description: self.description,
            request: self.request.unwrap_or_else(|| RequestSpec::new("GET", "/")),
            response,
        }
    }
}
