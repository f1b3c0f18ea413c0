use crate::error::Error;
use crate::interaction::{Interaction, PathPattern, RequestSpec, ResponseSpec};
use crate::matcher::{Matcher, MatchingRules, Rule};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// The wire form of a verified set of interactions: the document a provider
/// verification run consumes. Matchers are embedded in the JSON tree as
/// `{ "match": kind, ... }` objects and decode back to the identical
/// interaction set.
#[derive(Debug, Clone, PartialEq)]
pub struct Contract {
    pub consumer: String,
    pub provider: String,
    pub interactions: Vec<Interaction>,
}

impl Contract {
    pub fn to_json(&self) -> Value {
        json!({
            "consumer": self.consumer,
            "provider": self.provider,
            "interactions": self
                .interactions
                .iter()
                .map(encode_interaction)
                .collect::<Vec<Value>>(),
        })
    }

    pub fn from_json(value: &Value) -> Result<Self, Error> {
        let consumer = string_field(value, "consumer")?;
        let provider = string_field(value, "provider")?;
        let interactions = value
            .get("interactions")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::ContractFormat("'interactions' must be an array".into()))?
            .iter()
            .map(decode_interaction)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            consumer,
            provider,
            interactions,
        })
    }

    /// Write `<consumer>-<provider>.json` under `dir`, creating it if needed.
    pub fn write_to_dir<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf, Error> {
        fs::create_dir_all(dir.as_ref())?;
        let path = dir
            .as_ref()
            .join(format!("{}-{}.json", self.consumer, self.provider));
        fs::write(&path, serde_json::to_string_pretty(&self.to_json())?)?;

        Ok(path)
    }

    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&contents)?;
        Self::from_json(&value)
    }
}

fn string_field(value: &Value, field: &str) -> Result<String, Error> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| Error::ContractFormat(format!("'{}' must be a string", field)))
}

fn encode_interaction(interaction: &Interaction) -> Value {
    let mut encoded = Map::new();
    encoded.insert("description".into(), interaction.description.clone().into());
    if let Some(state) = &interaction.provider_state {
        encoded.insert("providerState".into(), state.clone().into());
    }
    encoded.insert("request".into(), encode_request(&interaction.request));
    encoded.insert("response".into(), encode_response(&interaction.response));

    Value::Object(encoded)
}

fn decode_interaction(value: &Value) -> Result<Interaction, Error> {
    let description = string_field(value, "description")?;
    let provider_state = value
        .get("providerState")
        .and_then(Value::as_str)
        .map(String::from);
    let request = decode_request(
        value
            .get("request")
            .ok_or_else(|| Error::ContractFormat("interaction without 'request'".into()))?,
    )?;
    let response = decode_response(
        value
            .get("response")
            .ok_or_else(|| Error::ContractFormat("interaction without 'response'".into()))?,
    )?;

    Ok(Interaction {
        provider_state,
        description,
        request,
        response,
    })
}

fn encode_request(request: &RequestSpec) -> Value {
    let mut encoded = Map::new();
    encoded.insert("method".into(), request.method.clone().into());
    encoded.insert("path".into(), request.path.raw().into());
    if let Some(query) = &request.query {
        encoded.insert("query".into(), query.clone().into());
    }
    if !request.headers.is_empty() {
        encoded.insert(
            "headers".into(),
            Value::Object(
                request
                    .headers
                    .iter()
                    .map(|(name, matcher)| (name.clone(), encode_matcher(matcher)))
                    .collect(),
            ),
        );
    }
    if let Some(body) = &request.body {
        encoded.insert("body".into(), encode_matcher(body));
    }
    if !request.matching_rules.is_empty() {
        encoded.insert("matchingRules".into(), encode_rules(&request.matching_rules));
    }

    Value::Object(encoded)
}

fn decode_request(value: &Value) -> Result<RequestSpec, Error> {
    let method = string_field(value, "method")?;
    let path = string_field(value, "path")?;

    let mut headers = BTreeMap::new();
    if let Some(map) = value.get("headers").and_then(Value::as_object) {
        for (name, encoded) in map {
            headers.insert(name.clone(), decode_matcher(encoded));
        }
    }

    Ok(RequestSpec {
        method,
        path: PathPattern::parse(path),
        query: value.get("query").and_then(Value::as_str).map(String::from),
        headers,
        body: value.get("body").map(decode_matcher),
        matching_rules: decode_rules(value.get("matchingRules"))?,
    })
}

fn encode_response(response: &ResponseSpec) -> Value {
    let mut encoded = Map::new();
    encoded.insert("status".into(), response.status.into());
    if !response.headers.is_empty() {
        encoded.insert(
            "headers".into(),
            Value::Object(
                response
                    .headers
                    .iter()
                    .map(|(name, value)| (name.clone(), Value::String(value.clone())))
                    .collect(),
            ),
        );
    }
    if let Some(body) = &response.body {
        encoded.insert("body".into(), encode_matcher(body));
    }
    if !response.matching_rules.is_empty() {
        encoded.insert(
            "matchingRules".into(),
            encode_rules(&response.matching_rules),
        );
    }

    Value::Object(encoded)
}

fn decode_response(value: &Value) -> Result<ResponseSpec, Error> {
    let status = value
        .get("status")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::ContractFormat("'status' must be a number".into()))?;

    let mut headers = BTreeMap::new();
    if let Some(map) = value.get("headers").and_then(Value::as_object) {
        for (name, header_value) in map {
            let text = header_value.as_str().ok_or_else(|| {
                Error::ContractFormat(format!("response header '{}' must be a string", name))
            })?;
            headers.insert(name.clone(), text.into());
        }
    }

    Ok(ResponseSpec {
        status: status as u16,
        headers,
        body: value.get("body").map(decode_matcher),
        matching_rules: decode_rules(value.get("matchingRules"))?,
    })
}

/// Recursive-descent encoding: containers recurse, matcher variants become
/// `{ "match": ... }` objects, literal scalars pass through.
fn encode_matcher(matcher: &Matcher) -> Value {
    match matcher {
        Matcher::Literal(value) => value.clone(),
        Matcher::Object(map) => Value::Object(
            map.iter()
                .map(|(key, child)| (key.clone(), encode_matcher(child)))
                .collect(),
        ),
        Matcher::Array(items) => Value::Array(items.iter().map(encode_matcher).collect()),
        Matcher::Like(inner) => json!({"match": "type", "value": encode_matcher(inner)}),
        Matcher::EachLike { template, min } => {
            json!({"match": "eachLike", "value": encode_matcher(template), "min": min})
        }
        Matcher::Term { pattern, example } => {
            json!({"match": "regex", "regex": pattern, "example": example})
        }
    }
}

/// Inverse of `encode_matcher`. An object is only treated as a matcher when
/// its `match` tag and parameters are well formed; anything else decodes as
/// plain structure, so unknown documents still load as literal shapes.
fn decode_matcher(value: &Value) -> Matcher {
    if let Value::Object(map) = value {
        if let Some(matcher) = decode_tagged_matcher(map) {
            return matcher;
        }
        return Matcher::Object(
            map.iter()
                .map(|(key, child)| (key.clone(), decode_matcher(child)))
                .collect(),
        );
    }
    if let Value::Array(items) = value {
        return Matcher::Array(items.iter().map(decode_matcher).collect());
    }

    Matcher::Literal(value.clone())
}

fn decode_tagged_matcher(map: &Map<String, Value>) -> Option<Matcher> {
    match map.get("match")?.as_str()? {
        "type" => Some(Matcher::Like(Box::new(decode_matcher(map.get("value")?)))),
        "eachLike" => Some(Matcher::EachLike {
            template: Box::new(decode_matcher(map.get("value")?)),
            min: map.get("min").and_then(Value::as_u64).unwrap_or(1) as usize,
        }),
        "regex" => Some(Matcher::Term {
            pattern: map.get("regex")?.as_str()?.into(),
            example: map.get("example")?.as_str()?.into(),
        }),
        _ => None,
    }
}

fn encode_rules(rules: &MatchingRules) -> Value {
    Value::Object(
        rules
            .iter()
            .map(|(path, rule)| {
                let encoded = match rule {
                    Rule::Equality => json!({"match": "equality"}),
                    Rule::Type => json!({"match": "type"}),
                    Rule::EachLike { min } => json!({"match": "type", "min": min}),
                    Rule::Regex(pattern) => json!({"match": "regex", "regex": pattern}),
                };
                (path.clone(), encoded)
            })
            .collect(),
    )
}

fn decode_rules(value: Option<&Value>) -> Result<MatchingRules, Error> {
    let mut rules = MatchingRules::new();
    let map = match value {
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(Error::ContractFormat(
                "'matchingRules' must be an object".into(),
            ))
        }
        None => return Ok(rules),
    };

    for (path, encoded) in map {
        let kind = encoded
            .get("match")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::ContractFormat(format!("rule at '{}' is missing 'match'", path))
            })?;
        let rule = match kind {
            "equality" => Rule::Equality,
            "type" => match encoded.get("min").and_then(Value::as_u64) {
                Some(min) => Rule::EachLike { min: min as usize },
                None => Rule::Type,
            },
            "regex" => {
                let pattern = encoded.get("regex").and_then(Value::as_str).ok_or_else(|| {
                    Error::ContractFormat(format!("regex rule at '{}' is missing 'regex'", path))
                })?;
                Rule::Regex(pattern.into())
            }
            other => {
                return Err(Error::ContractFormat(format!(
                    "unknown matcher kind '{}' at '{}'",
                    other, path
                )))
            }
        };
        rules.add(path.clone(), rule);
    }

    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{each_like, like, term};
    use serde_json::json;

    fn sample_contract() -> Contract {
        Contract {
            consumer: "pactify-example-consumer".into(),
            provider: "pactify-example-provider".into(),
            interactions: vec![
                Interaction::upon_receiving("a request for all products")
                    .given("products exist")
                    .with_request(
                        RequestSpec::new("GET", "/products")
                            .with_header("authorization", term("^Bearer .+$", "Bearer token")),
                    )
                    .will_respond_with(
                        ResponseSpec::new(200)
                            .with_header("content-type", "application/json; charset=utf-8")
                            .with_body(each_like(
                                json!({"id": "09", "name": "Gem Visa", "type": "CREDIT_CARD"}),
                            )),
                    ),
                Interaction::upon_receiving("a request for a product by ID")
                    .given("a product with ID 10 exists")
                    .with_request(RequestSpec::new("GET", "/product/{id}"))
                    .will_respond_with(
                        ResponseSpec::new(200)
                            .with_body(like(json!({"id": "10", "name": "28 Degrees"})))
                            .with_matching_rule("$.id", Rule::Regex("^[0-9]+$".into())),
                    ),
                Interaction::upon_receiving("a request for a non-existent product")
                    .given("a product with ID 11 does not exist")
                    .with_request(RequestSpec::new("GET", "/product/11"))
                    .will_respond_with(ResponseSpec::new(404)),
            ],
        }
    }

    #[test]
    fn contracts_round_trip_through_json() {
        let contract = sample_contract();
        let decoded = Contract::from_json(&contract.to_json()).unwrap();
        assert_eq!(decoded, contract);
    }

    #[test]
    fn contracts_round_trip_through_disk() {
        let contract = sample_contract();
        let dir = std::env::temp_dir().join(format!("pactify-test-{}", std::process::id()));
        let path = contract.write_to_dir(&dir).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "pactify-example-consumer-pactify-example-provider.json"
        );

        let decoded = Contract::read_from_file(&path).unwrap();
        let _ = fs::remove_dir_all(&dir);
        assert_eq!(decoded, contract);
    }

    #[test]
    fn matchers_are_encoded_as_tagged_objects() {
        let encoded = encode_matcher(&each_like(json!({"id": "09"})));
        assert_eq!(
            encoded,
            json!({"match": "eachLike", "value": {"id": "09"}, "min": 1})
        );
    }

    #[test]
    fn documents_without_matchers_decode_as_literal_shapes() {
        let decoded = decode_matcher(&json!({"id": "10", "tags": ["a", "b"]}));
        assert_eq!(
            decoded,
            Matcher::from_json(json!({"id": "10", "tags": ["a", "b"]}))
        );
    }

    #[test]
    fn malformed_documents_are_rejected() {
        assert!(Contract::from_json(&json!({"consumer": "c"})).is_err());
        assert!(Contract::from_json(&json!({
            "consumer": "c",
            "provider": "p",
            "interactions": [{"description": "d"}]
        }))
        .is_err());
    }
}
