use crate::data::product::Product;
use crate::error::Error;

type ReqwestClient = reqwest::blocking::Client;

const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_AUTH_TOKEN: &str = "Bearer 2019-01-14T11:34:18.045Z";

/// Builder used to build a ProductApiClient instance.
#[derive(Debug, Clone, Default)]
pub struct ProductApiClientBuilder {
    base_url: Option<String>,
    auth_token: Option<String>,
    http_client: Option<ReqwestClient>,
}

impl ProductApiClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the given base URL when building a ProductApiClient instance.
    pub fn with_base_url<T: Into<String>>(mut self, base_url: T) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Use the given Authorization header value instead of the default token.
    pub fn with_auth_token<T: Into<String>>(mut self, auth_token: T) -> Self {
        self.auth_token = Some(auth_token.into());
        self
    }

    /// Use the given blocking reqwest client when building a
    /// ProductApiClient instance.
    pub fn with_http_client(mut self, client: ReqwestClient) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn build(mut self) -> ProductApiClient {
        ProductApiClient {
            http: self.http_client.take().unwrap_or_default(),
            base_url: self
                .base_url
                .take()
                .unwrap_or_else(|| String::from(DEFAULT_BASE_URL)),
            auth_token: self
                .auth_token
                .take()
                .unwrap_or_else(|| String::from(DEFAULT_AUTH_TOKEN)),
        }
    }
}

/// HTTP client for the product catalogue API.
#[derive(Debug, Clone)]
pub struct ProductApiClient {
    http: ReqwestClient,
    base_url: String,
    auth_token: String,
}

impl ProductApiClient {
    pub fn new() -> Self {
        ProductApiClientBuilder::new().build()
    }

    /// Fetch the whole product catalogue.
    pub fn get_all_products(&self) -> Result<Vec<Product>, Error> {
        let response = self
            .http
            .get(format!("{}/products", self.base_url))
            .header("Authorization", &self.auth_token)
            .send()?;

        if !response.status().is_success() {
            return Err(Error::UnexpectedStatus(response.status().as_u16()));
        }

        Ok(response.json()?)
    }

    /// Fetch a single product by its id.
    pub fn get_product<T: AsRef<str>>(&self, id: T) -> Result<Product, Error> {
        let response = self
            .http
            .get(format!("{}/product/{}", self.base_url, id.as_ref()))
            .header("Authorization", &self.auth_token)
            .send()?;

        if !response.status().is_success() {
            return Err(Error::UnexpectedStatus(response.status().as_u16()));
        }

        Ok(response.json()?)
    }
}

impl Default for ProductApiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pactify::{
        each_like, like, pact_session_test, term, Interaction, Pact, PactConfiguration,
        RequestSpec, ResponseSpec, DEFAULT_GLOBAL_PORT,
    };
    use serde_json::json;

    const AUTH_PATTERN: &str = "^Bearer .+$";

    fn client_for(base_url: &str) -> ProductApiClient {
        ProductApiClientBuilder::new().with_base_url(base_url).build()
    }

    fn configuration() -> PactConfiguration {
        PactConfiguration::new("pactify-example-consumer", "pactify-example-provider")
    }

    #[test]
    fn fetches_all_products() {
        let mut pact = Pact::new(configuration());
        pact.setup().unwrap();
        pact.add_interaction(
            Interaction::upon_receiving("a request for all products")
                .given("products exist")
                .with_request(
                    RequestSpec::new("GET", "/products")
                        .with_header("Authorization", term(AUTH_PATTERN, DEFAULT_AUTH_TOKEN)),
                )
                .will_respond_with(
                    ResponseSpec::new(200)
                        .with_header("Content-Type", "application/json; charset=utf-8")
                        .with_body(each_like(
                            json!({"id": "09", "name": "Gem Visa", "type": "CREDIT_CARD"}),
                        )),
                ),
        )
        .unwrap();

        let products = pact
            .execute_test(|base_url| client_for(base_url).get_all_products())
            .unwrap()
            .unwrap()
            .unwrap();

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].product_type, "CREDIT_CARD");
        pact.finalize().unwrap();
    }

    #[test]
    fn fetches_a_product_by_id() {
        let expected = json!({"id": "10", "name": "28 Degrees", "type": "CREDIT_CARD"});

        let mut pact = Pact::new(configuration());
        pact.setup().unwrap();
        pact.add_interaction(
            Interaction::upon_receiving("a request for a product by ID")
                .given("a product with ID 10 exists")
                .with_request(
                    RequestSpec::new("GET", "/product/10")
                        .with_header("Authorization", term(AUTH_PATTERN, DEFAULT_AUTH_TOKEN)),
                )
                .will_respond_with(
                    ResponseSpec::new(200)
                        .with_header("Content-Type", "application/json; charset=utf-8")
                        .with_body(like(expected.clone())),
                ),
        )
        .unwrap();

        let product = pact
            .execute_test(|base_url| client_for(base_url).get_product("10"))
            .unwrap()
            .unwrap()
            .unwrap();

        assert_eq!(
            product,
            Product {
                id: "10".into(),
                name: "28 Degrees".into(),
                product_type: "CREDIT_CARD".into(),
            }
        );
        pact.finalize().unwrap();
    }

    #[test]
    fn returns_an_error_for_a_nonexistent_product() {
        let mut pact = Pact::new(configuration());
        pact.setup().unwrap();
        pact.add_interaction(
            Interaction::upon_receiving("a request for a non-existent product by ID")
                .given("a product with ID 11 does not exist")
                .with_request(
                    RequestSpec::new("GET", "/product/11")
                        .with_header("Authorization", term(AUTH_PATTERN, DEFAULT_AUTH_TOKEN)),
                )
                .will_respond_with(ResponseSpec::new(404)),
        )
        .unwrap();

        let result = pact
            .execute_test(|base_url| client_for(base_url).get_product("11"))
            .unwrap()
            .unwrap();

        match result {
            Err(Error::UnexpectedStatus(404)) => {}
            other => panic!("expected an UnexpectedStatus(404) error, got {:?}", other),
        }
        // the interaction was exercised even though the response was non-2xx
        pact.finalize().unwrap();
    }

    fn configure_session(configuration: &mut PactConfiguration) {
        configuration.set_consumer("pactify-example-consumer");
        configuration.set_provider("pactify-example-provider");
    }

    fn register_catalogue_interaction(pact: &mut Pact) -> Result<(), pactify::Error> {
        pact.add_interaction(
            Interaction::upon_receiving("a session request for all products")
                .given("products exist")
                .with_request(
                    RequestSpec::new("GET", "/products")
                        .with_header("Authorization", term(AUTH_PATTERN, DEFAULT_AUTH_TOKEN)),
                )
                .will_respond_with(
                    ResponseSpec::new(200).with_body(each_like(
                        json!({"id": "10", "name": "28 Degrees", "type": "CREDIT_CARD"}),
                    )),
                ),
        )
    }

    #[pact_session_test(configure_session, register_catalogue_interaction)]
    fn fetches_all_products_in_a_global_session() {
        let client = client_for(&format!("http://localhost:{}", DEFAULT_GLOBAL_PORT));
        let products = client.get_all_products().unwrap();
        assert_eq!(products[0].name, "28 Degrees");
    }
}
