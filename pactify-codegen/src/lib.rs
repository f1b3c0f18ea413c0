use proc_macro::TokenStream;
use quote::quote;

/// Wraps a test in a global-session pact scenario.
///
/// Takes two function paths: a configuration function
/// `fn(&mut pactify::PactConfiguration)` and a registration function
/// `fn(&mut pactify::Pact) -> Result<(), pactify::Error>`. The generated
/// test acquires the shared mock server, registers the interactions, runs
/// the body (panics included) and always finalizes the session before
/// rethrowing or asserting verification.
#[proc_macro_attribute]
pub fn pact_session_test(attrs: TokenStream, item: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(item as syn::ItemFn);
    let args = syn::parse_macro_input!(attrs as syn::AttributeArgs);

    let signature = &input.sig;
    let block = &input.block;

    if args.len() < 2 {
        return quote! {
            compile_error!("a configuration function and a registration function should be passed to the macro");
        }
        .into();
    }

    let configuration_function = match &args[0] {
        syn::NestedMeta::Meta(syn::Meta::Path(function_path)) => function_path,
        _ => {
            return quote! {
                compile_error!("the first argument should be a configuration function!");
            }
            .into()
        }
    };

    let registration_function = match &args[1] {
        syn::NestedMeta::Meta(syn::Meta::Path(function_path)) => function_path,
        _ => {
            return quote! {
                compile_error!("the second argument should be a registration function!");
            }
            .into()
        }
    };

    let output = quote! {
        #[test]
        #signature {
            let mut __pact_configuration = pactify::PactConfiguration::default();
            #configuration_function(&mut __pact_configuration);
            __pact_configuration.set_mode(pactify::SessionMode::Global);

            let mut __pact = pactify::Pact::new(__pact_configuration);
            if let Err(e) = __pact.setup() {
                panic!("pact setup failed: {}", e);
            }
            if let Err(e) = #registration_function(&mut __pact) {
                let _ = __pact.finalize();
                panic!("pact registration failed: {}", e);
            }

            match __pact.execute_test(|__pact_base_url| {
                let _ = &__pact_base_url;
                #block
            }) {
                Ok(Ok(_)) => {}
                Ok(Err(panic_payload)) => {
                    let _ = __pact.finalize();
                    std::panic::resume_unwind(panic_payload);
                }
                Err(e) => {
                    let _ = __pact.finalize();
                    panic!("pact execution failed: {}", e);
                }
            }

            if let Err(e) = __pact.finalize() {
                panic!("pact verification failed: {}", e);
            }
        }
    };

    TokenStream::from(output)
}
