use crate::error::Error;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;

/// An expected JSON shape. Literal containers are normalized into `Object`
/// and `Array` nodes so a matcher tree always mirrors the JSON tree it
/// describes and can be rebuilt from its encoded form without loss.
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    /// A scalar compared by equality.
    Literal(Value),
    Object(BTreeMap<String, Matcher>),
    Array(Vec<Matcher>),
    /// Accepts any value of the same JSON type as the example ("like").
    Like(Box<Matcher>),
    /// Accepts arrays of at least `min` elements, each conforming to the
    /// template by type ("eachLike").
    EachLike { template: Box<Matcher>, min: usize },
    /// Accepts strings matching the pattern; the example is only used when
    /// synthesizing a response body.
    Term { pattern: String, example: String },
}

impl Matcher {
    /// Normalize a plain JSON value into a matcher tree of literal leaves.
    pub fn from_json(value: Value) -> Matcher {
        match value {
            Value::Object(map) => Matcher::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Matcher::from_json(v)))
                    .collect(),
            ),
            Value::Array(items) => {
                Matcher::Array(items.into_iter().map(Matcher::from_json).collect())
            }
            scalar => Matcher::Literal(scalar),
        }
    }

    /// The example value this matcher was built from, with all matching
    /// annotations stripped. Used to synthesize mock responses and provider
    /// verification requests in a single recursive descent.
    pub fn example_value(&self) -> Value {
        match self {
            Matcher::Literal(v) => v.clone(),
            Matcher::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, m)| (k.clone(), m.example_value()))
                    .collect(),
            ),
            Matcher::Array(items) => Value::Array(items.iter().map(|m| m.example_value()).collect()),
            Matcher::Like(inner) => inner.example_value(),
            Matcher::EachLike { template, min } => {
                let count = (*min).max(1);
                Value::Array((0..count).map(|_| template.example_value()).collect())
            }
            Matcher::Term { example, .. } => Value::String(example.clone()),
        }
    }

    /// Reject matchers that could never be applied, e.g. regex patterns that
    /// don't compile. Run once at registration so faults surface as
    /// registration errors instead of per-request mismatches.
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            Matcher::Literal(_) => Ok(()),
            Matcher::Object(map) => map.values().try_for_each(Matcher::validate),
            Matcher::Array(items) => items.iter().try_for_each(Matcher::validate),
            Matcher::Like(inner) => inner.validate(),
            Matcher::EachLike { template, .. } => template.validate(),
            Matcher::Term { pattern, .. } => {
                Regex::new(pattern)?;
                Ok(())
            }
        }
    }
}

impl From<Value> for Matcher {
    fn from(value: Value) -> Self {
        Matcher::from_json(value)
    }
}

impl From<&str> for Matcher {
    fn from(value: &str) -> Self {
        Matcher::Literal(Value::String(value.into()))
    }
}

impl From<String> for Matcher {
    fn from(value: String) -> Self {
        Matcher::Literal(Value::String(value))
    }
}

/// Type-relaxed matcher: accepts any value of the same JSON type as `example`.
pub fn like(example: Value) -> Matcher {
    Matcher::Like(Box::new(Matcher::from_json(example)))
}

/// Array-template matcher with a minimum of one element.
pub fn each_like(template: Value) -> Matcher {
    each_like_min(template, 1)
}

/// Array-template matcher requiring at least `min` conforming elements.
pub fn each_like_min(template: Value, min: usize) -> Matcher {
    Matcher::EachLike {
        template: Box::new(Matcher::from_json(template)),
        min,
    }
}

/// Regex matcher. The pattern is validated when the interaction is registered.
pub fn term<P: Into<String>, E: Into<String>>(pattern: P, example: E) -> Matcher {
    Matcher::Term {
        pattern: pattern.into(),
        example: example.into(),
    }
}

/// A rule overriding the default comparison at one JSON path.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Equality,
    Type,
    EachLike { min: usize },
    Regex(String),
}

/// Rules addressed by JSON path (`$`, `$.name`, `$[*].id`). A rule applies at
/// its exact path; `[*]` stands for any array index. When several rule paths
/// cover the same concrete path, the one with the fewest wildcards wins.
/// Deeper rules take precedence naturally: the engine consults the rules at
/// every node it descends into.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchingRules {
    rules: BTreeMap<String, Rule>,
}

impl MatchingRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<P: Into<String>>(&mut self, path: P, rule: Rule) {
        self.rules.insert(path.into(), rule);
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Rule)> {
        self.rules.iter()
    }

    pub fn validate(&self) -> Result<(), Error> {
        for rule in self.rules.values() {
            if let Rule::Regex(pattern) = rule {
                Regex::new(pattern)?;
            }
        }
        Ok(())
    }

    fn lookup(&self, path: &str) -> Option<&Rule> {
        let concrete = split_path(path);
        let mut best: Option<(usize, &Rule)> = None;

        for (rule_path, rule) in &self.rules {
            let candidate = split_path(rule_path);
            if !segments_match(&candidate, &concrete) {
                continue;
            }
            let literal_count = candidate.iter().filter(|s| *s != "[*]").count();
            // BTreeMap order breaks ties deterministically
            if best.map_or(true, |(count, _)| literal_count > count) {
                best = Some((literal_count, rule));
            }
        }

        best.map(|(_, rule)| rule)
    }
}

fn segments_match(rule: &[String], concrete: &[String]) -> bool {
    rule.len() == concrete.len()
        && rule.iter().zip(concrete).all(|(r, c)| {
            r == c || (r == "[*]" && c.starts_with('[') && c.ends_with(']'))
        })
}

/// Split a JSON path into segments: `$.a[0].b` -> `["$", "a", "[0]", "b"]`.
fn split_path(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '$' if segments.is_empty() && current.is_empty() => segments.push("$".into()),
            '.' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                let mut index = String::from("[");
                for ic in chars.by_ref() {
                    index.push(ic);
                    if ic == ']' {
                        break;
                    }
                }
                segments.push(index);
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }

    segments
}

/// A single reason a value failed to match, anchored at a JSON path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mismatch {
    pub path: String,
    pub expected: String,
    pub actual: String,
}

impl Mismatch {
    fn new<P: Into<String>, E: Into<String>, A: Into<String>>(
        path: P,
        expected: E,
        actual: A,
    ) -> Self {
        Self {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "at {}: expected {}, got {}",
            self.path, self.expected, self.actual
        )
    }
}

#[derive(Copy, Clone, Eq, PartialEq)]
enum Mode {
    Exact,
    Type,
}

/// Compare an actual JSON value against an expected shape. Returns every
/// mismatch found, in a deterministic order (object keys sorted, array
/// indices ascending); an empty result means the value matched.
pub fn match_value(
    expected: &Matcher,
    actual: &Value,
    path: &str,
    rules: &MatchingRules,
) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();
    match_at(expected, actual, path, rules, Mode::Exact, &mut mismatches);
    mismatches
}

fn match_at(
    expected: &Matcher,
    actual: &Value,
    path: &str,
    rules: &MatchingRules,
    mode: Mode,
    out: &mut Vec<Mismatch>,
) {
    if let Some(rule) = rules.lookup(path) {
        apply_rule(rule, expected, actual, path, rules, out);
    } else {
        match_node(expected, actual, path, rules, mode, out);
    }
}

fn apply_rule(
    rule: &Rule,
    expected: &Matcher,
    actual: &Value,
    path: &str,
    rules: &MatchingRules,
    out: &mut Vec<Mismatch>,
) {
    match rule {
        Rule::Equality => {
            let example = expected.example_value();
            if &example != actual {
                out.push(Mismatch::new(path, render(&example), render(actual)));
            }
        }
        Rule::Type => match_node(expected, actual, path, rules, Mode::Type, out),
        Rule::EachLike { min } => {
            let template = each_like_template(expected);
            match_elements(template, actual, path, *min, rules, out);
        }
        Rule::Regex(pattern) => match_regex(pattern, actual, path, out),
    }
}

/// The element template an each-like rule applies: the declared template for
/// an `EachLike` node, the first element of an array example, or the expected
/// shape itself when it is not an array.
fn each_like_template(expected: &Matcher) -> &Matcher {
    match expected {
        Matcher::EachLike { template, .. } => template,
        Matcher::Like(inner) => each_like_template(inner),
        Matcher::Array(items) if !items.is_empty() => &items[0],
        other => other,
    }
}

fn match_node(
    expected: &Matcher,
    actual: &Value,
    path: &str,
    rules: &MatchingRules,
    mode: Mode,
    out: &mut Vec<Mismatch>,
) {
    match expected {
        Matcher::Like(inner) => match_node(inner, actual, path, rules, Mode::Type, out),
        Matcher::EachLike { template, min } => {
            match_elements(template, actual, path, *min, rules, out)
        }
        Matcher::Term { pattern, .. } => match_regex(pattern, actual, path, out),
        Matcher::Literal(value) => match mode {
            Mode::Exact => {
                if value != actual {
                    out.push(Mismatch::new(path, render(value), render(actual)));
                }
            }
            Mode::Type => {
                if json_type(value) != json_type(actual) {
                    out.push(Mismatch::new(
                        path,
                        format!("a value of type {}", json_type(value)),
                        render(actual),
                    ));
                }
            }
        },
        Matcher::Object(map) => match_object(map, actual, path, rules, mode, out),
        Matcher::Array(items) => match_array(items, actual, path, rules, mode, out),
    }
}

fn match_object(
    expected: &BTreeMap<String, Matcher>,
    actual: &Value,
    path: &str,
    rules: &MatchingRules,
    mode: Mode,
    out: &mut Vec<Mismatch>,
) {
    let actual_map = match actual {
        Value::Object(map) => map,
        other => {
            out.push(Mismatch::new(path, "an object", render(other)));
            return;
        }
    };

    // same key set in both modes; BTreeMap keeps the report order stable
    for (key, matcher) in expected {
        let child_path = format!("{}.{}", path, key);
        match actual_map.get(key) {
            Some(value) => match_at(matcher, value, &child_path, rules, mode, out),
            None => out.push(Mismatch::new(child_path, describe(matcher), "missing")),
        }
    }

    let mut unexpected: Vec<&String> = actual_map
        .keys()
        .filter(|k| !expected.contains_key(*k))
        .collect();
    unexpected.sort();
    for key in unexpected {
        out.push(Mismatch::new(
            format!("{}.{}", path, key),
            "no such key",
            render(&actual_map[key]),
        ));
    }
}

fn match_array(
    expected: &[Matcher],
    actual: &Value,
    path: &str,
    rules: &MatchingRules,
    mode: Mode,
    out: &mut Vec<Mismatch>,
) {
    let actual_items = match actual {
        Value::Array(items) => items,
        other => {
            out.push(Mismatch::new(path, "an array", render(other)));
            return;
        }
    };

    match mode {
        Mode::Exact => {
            if expected.len() != actual_items.len() {
                out.push(Mismatch::new(
                    path,
                    format!("an array of {} elements", expected.len()),
                    format!("an array of {} elements", actual_items.len()),
                ));
            }
            for (i, (matcher, value)) in expected.iter().zip(actual_items).enumerate() {
                match_at(matcher, value, &format!("{}[{}]", path, i), rules, mode, out);
            }
        }
        Mode::Type => {
            // extra actual elements are checked against the first template
            // element; an empty template accepts any array
            for (i, value) in actual_items.iter().enumerate() {
                let template = expected.get(i).or_else(|| expected.first());
                if let Some(template) = template {
                    match_at(template, value, &format!("{}[{}]", path, i), rules, mode, out);
                }
            }
        }
    }
}

fn match_elements(
    template: &Matcher,
    actual: &Value,
    path: &str,
    min: usize,
    rules: &MatchingRules,
    out: &mut Vec<Mismatch>,
) {
    let items = match actual {
        Value::Array(items) => items,
        other => {
            out.push(Mismatch::new(path, "an array", render(other)));
            return;
        }
    };

    if items.len() < min {
        out.push(Mismatch::new(
            path,
            format!("an array of at least {} elements", min),
            format!("an array of {} elements", items.len()),
        ));
    }

    for (i, value) in items.iter().enumerate() {
        match_at(
            template,
            value,
            &format!("{}[{}]", path, i),
            rules,
            Mode::Type,
            out,
        );
    }
}

fn match_regex(pattern: &str, actual: &Value, path: &str, out: &mut Vec<Mismatch>) {
    let text = match actual {
        Value::String(s) => s,
        other => {
            out.push(Mismatch::new(
                path,
                format!("a string matching '{}'", pattern),
                render(other),
            ));
            return;
        }
    };

    match Regex::new(pattern) {
        Ok(regex) => {
            if !regex.is_match(text) {
                out.push(Mismatch::new(
                    path,
                    format!("a string matching '{}'", pattern),
                    render(actual),
                ));
            }
        }
        // registration validates patterns; an invalid one still degrades to
        // a mismatch instead of a panic
        Err(e) => out.push(Mismatch::new(
            path,
            format!("a valid regex ({})", e),
            render(actual),
        )),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn render(value: &Value) -> String {
    value.to_string()
}

fn describe(matcher: &Matcher) -> String {
    match matcher {
        Matcher::Literal(v) => render(v),
        Matcher::Object(_) => "an object".into(),
        Matcher::Array(_) => "an array".into(),
        Matcher::Like(inner) => format!(
            "a value of type {}",
            json_type(&inner.example_value())
        ),
        Matcher::EachLike { min, .. } => format!("an array of at least {} elements", min),
        Matcher::Term { pattern, .. } => format!("a string matching '{}'", pattern),
    }
}
