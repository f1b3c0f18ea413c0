use crate::data::{self, RequestData, ResponseData};
use crate::error::Error;
use async_trait::async_trait;
use hyper::{body, Body, Request};
use hyper_tls::HttpsConnector;
use std::fmt::Debug;

/// Transport used to replay contract interactions against a real provider.
/// Swappable so verification tests can run against an in-process provider.
#[async_trait]
pub trait HttpClient: Debug {
    async fn execute(&self, base_url: &str, request: &RequestData)
        -> Result<ResponseData, Error>;
}

#[derive(Debug, Default)]
pub struct HyperHttpClient {}

impl HyperHttpClient {
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait]
impl HttpClient for HyperHttpClient {
    async fn execute(
        &self,
        base_url: &str,
        request_data: &RequestData,
    ) -> Result<ResponseData, Error> {
        let url = match &request_data.query {
            Some(query) => format!("{}{}?{}", base_url, request_data.path, query),
            None => format!("{}{}", base_url, request_data.path),
        };

        let mut request_builder = Request::builder()
            .uri(url.as_str())
            .method(request_data.method.as_str());

        if let Some(headers_mut) = request_builder.headers_mut() {
            data::put_headers(
                headers_mut,
                request_data
                    .headers
                    .iter()
                    .filter(|(header_name, _)| header_name.as_str() != "host"),
            )?;
        }

        let request: Request<Body> = request_builder.body(request_data.body.clone().into())?;

        let client = hyper::Client::builder().build(HttpsConnector::new());
        let response = client.request(request).await?;

        let status = response.status().as_u16();
        let headers = data::extract_headers(response.headers());
        let body = body::to_bytes(response.into_body()).await?;

        Ok(ResponseData {
            status,
            headers,
            body: String::from_utf8_lossy(&body).into(),
        })
    }
}
