use hyper::header::{HeaderName, HeaderValue};
use hyper::HeaderMap;
use std::collections::HashMap;

/// A parsed inbound request in registry-comparable shape. Header names are
/// lowercased on extraction so matching is case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct RequestData {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HashMap<String, String>,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct ResponseData {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

pub(crate) fn extract_headers(header_map: &HeaderMap) -> HashMap<String, String> {
    // header values with opaque characters are ignored
    header_map
        .iter()
        .map(|(k, v)| (k.as_str().to_lowercase(), v.to_str()))
        .filter_map(|(key, value)| value.ok().map(|v| (key, String::from(v))))
        .collect::<HashMap<_, _>>()
}

pub(crate) fn put_headers<'a, I: IntoIterator<Item = (&'a String, &'a String)>>(
    header_map: &mut HeaderMap<HeaderValue>,
    headers: I,
) -> Result<(), crate::error::Error> {
    for (key, value) in headers {
        let header_name = HeaderName::from_lowercase(key.to_lowercase().as_bytes())?;
        let header_value = HeaderValue::from_str(value)?;
        header_map.append(header_name, header_value);
    }

    Ok(())
}
