#[cfg(test)]
mod tests {
    use pactify::{
        each_like, like, term, Contract, Error, Interaction, MockServer, Pact, PactConfiguration,
        ProviderVerifier, RequestSpec, ResponseSpec, SessionMode,
    };
    use serde_json::{json, Value};

    const AUTH_TOKEN: &str = "Bearer 2019-01-14T11:34:18.045Z";
    const AUTH_PATTERN: &str = "^Bearer .+$";

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn configuration() -> PactConfiguration {
        PactConfiguration::new("pactify-example-consumer", "pactify-example-provider")
    }

    fn http_get(base_url: &str, path: &str) -> reqwest::blocking::Response {
        reqwest::blocking::Client::new()
            .get(format!("{}{}", base_url, path))
            .header("Authorization", AUTH_TOKEN)
            .send()
            .expect("request should reach the mock server")
    }

    fn product_by_id_interaction() -> Interaction {
        Interaction::upon_receiving("a request for a product by ID")
            .given("a product with ID 10 exists")
            .with_request(
                RequestSpec::new("GET", "/product/10")
                    .with_header("Authorization", term(AUTH_PATTERN, AUTH_TOKEN)),
            )
            .will_respond_with(
                ResponseSpec::new(200)
                    .with_header("Content-Type", "application/json; charset=utf-8")
                    .with_body(like(
                        json!({"id": "10", "name": "28 Degrees", "type": "CREDIT_CARD"}),
                    )),
            )
    }

    fn all_products_interaction() -> Interaction {
        Interaction::upon_receiving("a request for all products")
            .given("products exist")
            .with_request(
                RequestSpec::new("GET", "/products")
                    .with_header("Authorization", term(AUTH_PATTERN, AUTH_TOKEN)),
            )
            .will_respond_with(ResponseSpec::new(200).with_body(each_like(
                json!({"id": "09", "name": "Gem Visa", "type": "CREDIT_CARD"}),
            )))
    }

    #[test]
    fn a_matching_consumer_request_round_trips() {
        init_logging();
        let mut pact = Pact::new(configuration());
        pact.setup().unwrap();
        pact.add_interaction(product_by_id_interaction()).unwrap();

        let body = pact
            .execute_test(|base_url| {
                let response = http_get(base_url, "/product/10");
                assert_eq!(response.status().as_u16(), 200);
                response.json::<Value>().unwrap()
            })
            .unwrap()
            .unwrap();

        assert_eq!(
            body,
            json!({"id": "10", "name": "28 Degrees", "type": "CREDIT_CARD"})
        );
        pact.verify().unwrap();
        pact.finalize().unwrap();
    }

    #[test]
    fn a_non_2xx_interaction_still_counts_as_exercised() {
        init_logging();
        let mut pact = Pact::new(configuration());
        pact.setup().unwrap();
        pact.add_interaction(
            Interaction::upon_receiving("a request for a non-existent product by ID")
                .given("a product with ID 11 does not exist")
                .with_request(
                    RequestSpec::new("GET", "/product/11")
                        .with_header("Authorization", term(AUTH_PATTERN, AUTH_TOKEN)),
                )
                .will_respond_with(ResponseSpec::new(404)),
        )
        .unwrap();

        let status = pact
            .execute_test(|base_url| http_get(base_url, "/product/11").status().as_u16())
            .unwrap()
            .unwrap();

        assert_eq!(status, 404);
        pact.finalize().unwrap();
    }

    #[test]
    fn each_like_responses_contain_at_least_one_conforming_element() {
        init_logging();
        let mut pact = Pact::new(configuration());
        pact.setup().unwrap();
        pact.add_interaction(all_products_interaction()).unwrap();

        let products = pact
            .execute_test(|base_url| http_get(base_url, "/products").json::<Value>().unwrap())
            .unwrap()
            .unwrap();

        let products = products.as_array().expect("an array of products");
        assert!(!products.is_empty());
        for product in products {
            assert!(product["id"].is_string());
            assert!(product["name"].is_string());
            assert!(product["type"].is_string());
        }
        pact.finalize().unwrap();
    }

    #[test]
    fn an_unmatched_request_returns_500_and_fails_verification() {
        init_logging();
        let mut pact = Pact::new(configuration());
        pact.setup().unwrap();
        pact.add_interaction(product_by_id_interaction()).unwrap();

        let (status, body) = pact
            .execute_test(|base_url| {
                let response = http_get(base_url, "/product/99");
                (response.status().as_u16(), response.json::<Value>().unwrap())
            })
            .unwrap()
            .unwrap();

        assert_eq!(status, 500);
        assert_eq!(body["error"], "no interaction matched the request");

        match pact.finalize() {
            Err(Error::UnverifiedInteractions(failure)) => {
                assert_eq!(failure.unexercised, vec!["a request for a product by ID"]);
                assert_eq!(failure.unmatched.len(), 1);
                assert_eq!(failure.unmatched[0].path, "/product/99");
            }
            other => panic!("expected UnverifiedInteractions, got {:?}", other),
        }
    }

    #[test]
    fn a_successful_scenario_writes_the_contract_document() {
        init_logging();
        let dir = std::env::temp_dir().join(format!("pactify-contracts-{}", std::process::id()));

        let mut config = configuration();
        config.set_output_dir(&dir);
        let mut pact = Pact::new(config);
        pact.setup().unwrap();
        pact.add_interaction(product_by_id_interaction()).unwrap();

        pact.execute_test(|base_url| {
            http_get(base_url, "/product/10");
        })
        .unwrap()
        .unwrap();
        pact.finalize().unwrap();

        let contract = Contract::read_from_file(
            dir.join("pactify-example-consumer-pactify-example-provider.json"),
        )
        .unwrap();
        let _ = std::fs::remove_dir_all(&dir);

        assert_eq!(contract.consumer, "pactify-example-consumer");
        assert_eq!(contract.provider, "pactify-example-provider");
        assert_eq!(contract.interactions, vec![product_by_id_interaction()]);
    }

    /// Stand up a mock server acting as the "real" provider for replay.
    fn provider_server(interactions: Vec<Interaction>) -> MockServer {
        let mut server = MockServer::new();
        server.start(0).unwrap();
        for interaction in interactions {
            server.register(interaction).unwrap();
        }
        server.accept_requests().unwrap();
        server
    }

    #[test]
    fn provider_verification_accepts_a_compliant_provider() {
        init_logging();
        let contract = Contract {
            consumer: "pactify-example-consumer".into(),
            provider: "pactify-example-provider".into(),
            interactions: vec![product_by_id_interaction(), all_products_interaction()],
        };

        let provider = provider_server(contract.interactions.clone());
        let verifier = ProviderVerifier::new(provider.base_url().unwrap());

        verifier.verify(&contract).unwrap();
    }

    #[test]
    fn provider_verification_rejects_a_divergent_provider() {
        init_logging();
        let contract = Contract {
            consumer: "pactify-example-consumer".into(),
            provider: "pactify-example-provider".into(),
            interactions: vec![product_by_id_interaction()],
        };

        // same endpoint, but the id comes back as a number
        let divergent = Interaction::upon_receiving("a request for a product by ID")
            .given("a product with ID 10 exists")
            .with_request(
                RequestSpec::new("GET", "/product/10")
                    .with_header("Authorization", term(AUTH_PATTERN, AUTH_TOKEN)),
            )
            .will_respond_with(
                ResponseSpec::new(200)
                    .with_header("Content-Type", "application/json; charset=utf-8")
                    .with_body(json!({"id": 10, "name": "28 Degrees", "type": "CREDIT_CARD"})),
            );

        let provider = provider_server(vec![divergent]);
        let verifier = ProviderVerifier::new(provider.base_url().unwrap());

        match verifier.verify(&contract) {
            Err(Error::ProviderVerification(failure)) => {
                let mismatches = &failure.unmatched[0].candidates[0].mismatches;
                assert!(mismatches.iter().any(|m| m.path == "$.id"));
            }
            other => panic!("expected ProviderVerification, got {:?}", other),
        }
    }

    #[test]
    fn provider_responses_with_zero_elements_are_rejected() {
        init_logging();
        let contract = Contract {
            consumer: "pactify-example-consumer".into(),
            provider: "pactify-example-provider".into(),
            interactions: vec![all_products_interaction()],
        };

        let empty_catalogue = Interaction::upon_receiving("a request for all products")
            .given("products exist")
            .with_request(
                RequestSpec::new("GET", "/products")
                    .with_header("Authorization", term(AUTH_PATTERN, AUTH_TOKEN)),
            )
            .will_respond_with(ResponseSpec::new(200).with_body(json!([])));

        let provider = provider_server(vec![empty_catalogue]);
        let verifier = ProviderVerifier::new(provider.base_url().unwrap());

        match verifier.verify(&contract) {
            Err(Error::ProviderVerification(failure)) => {
                let mismatches = &failure.unmatched[0].candidates[0].mismatches;
                assert_eq!(mismatches[0].path, "$");
                assert_eq!(mismatches[0].expected, "an array of at least 1 elements");
            }
            other => panic!("expected ProviderVerification, got {:?}", other),
        }
    }

    #[test]
    fn concurrent_matching_requests_each_count_exactly_once() {
        init_logging();
        let mut server = MockServer::new();
        server.start(0).unwrap();
        server.register(product_by_id_interaction()).unwrap();
        server.accept_requests().unwrap();
        let base_url = server.base_url().unwrap().to_string();

        let clients: Vec<_> = (0..8)
            .map(|_| {
                let base_url = base_url.clone();
                std::thread::spawn(move || {
                    assert_eq!(http_get(&base_url, "/product/10").status().as_u16(), 200);
                })
            })
            .collect();
        for client in clients {
            client.join().unwrap();
        }

        let report = server.report().unwrap();
        assert_eq!(report.times_exercised(0), 8);
        assert!(report.unmatched_requests().is_empty());
    }

    #[test]
    fn global_sessions_serialize_without_cross_talk() {
        init_logging();
        let scenario = |description: &'static str, path: &'static str| {
            move || {
                let mut config = configuration();
                config.set_mode(SessionMode::Global);
                let mut pact = Pact::new(config);
                pact.setup().unwrap();
                pact.add_interaction(
                    Interaction::upon_receiving(description)
                        .with_request(RequestSpec::new("GET", path))
                        .will_respond_with(
                            ResponseSpec::new(200).with_body(json!({"path": path})),
                        ),
                )
                .unwrap();

                let body = pact
                    .execute_test(|base_url| {
                        reqwest::blocking::get(format!("{}{}", base_url, path))
                            .unwrap()
                            .json::<Value>()
                            .unwrap()
                    })
                    .unwrap()
                    .unwrap();

                assert_eq!(body["path"], path);
                pact.finalize().unwrap();
            }
        };

        let first = std::thread::spawn(scenario("a request for the first path", "/first"));
        let second = std::thread::spawn(scenario("a request for the second path", "/second"));
        first.join().unwrap();
        second.join().unwrap();
    }
}
