use crate::config::{PactConfiguration, SessionMode};
use crate::contract::Contract;
use crate::error::Error;
use crate::interaction::Interaction;
use crate::mock_server::{MockServer, ServerState};
use lazy_static::lazy_static;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};

/// The port the shared global-session server binds to.
pub const DEFAULT_GLOBAL_PORT: u16 = 61418;

lazy_static! {
    static ref GLOBAL_SERVER: Mutex<Option<MockServer>> = Mutex::new(None);
    static ref SESSION_LOCK: Arc<(Mutex<bool>, Condvar)> =
        Arc::new((Mutex::new(false), Condvar::new()));
}

fn enter_session() -> Result<(), Error> {
    let (lock, cond) = &**SESSION_LOCK;
    let mut is_session_running = cond
        .wait_while(
            lock.lock().map_err(|_| Error::PoisonedLock)?,
            |is_session_running| *is_session_running,
        )
        .map_err(|_| Error::PoisonedLock)?;
    *is_session_running = true;

    Ok(())
}

fn exit_session() {
    let (lock, cond) = &**SESSION_LOCK;
    if let Ok(mut is_session_running) = lock.lock() {
        *is_session_running = false;
    }

    cond.notify_one();
}

enum ServerHandle {
    Inactive,
    Owned(MockServer),
    /// Borrowed from the global slot for the duration of the scenario; the
    /// session lock is held until it is returned.
    Global(MockServer),
}

/// Verification controller bracketing one test scenario.
///
/// ```no_run
/// use pactify::{each_like, Interaction, Pact, PactConfiguration, RequestSpec, ResponseSpec};
/// use serde_json::json;
///
/// let mut pact = Pact::new(PactConfiguration::new("example-consumer", "example-provider"));
/// pact.setup().unwrap();
/// pact.add_interaction(
///     Interaction::upon_receiving("a request for all products")
///         .given("products exist")
///         .with_request(RequestSpec::new("GET", "/products"))
///         .will_respond_with(
///             ResponseSpec::new(200).with_body(each_like(json!({"id": "09"}))),
///         ),
/// )
/// .unwrap();
/// let result = pact.execute_test(|base_url| {
///     // drive the consumer client against base_url
/// });
/// pact.finalize().unwrap();
/// result.unwrap().unwrap();
/// ```
///
/// Teardown always runs, including when the test body panics: `finalize`
/// releases the server, and `Drop` covers every other exit path.
pub struct Pact {
    configuration: PactConfiguration,
    server: ServerHandle,
}

impl Pact {
    pub fn new(configuration: PactConfiguration) -> Self {
        Self {
            configuration,
            server: ServerHandle::Inactive,
        }
    }

    pub fn configuration(&self) -> &PactConfiguration {
        &self.configuration
    }

    /// Acquire and start the mock server and clear its registry. In global
    /// mode this blocks until no other scenario holds the shared server.
    pub fn setup(&mut self) -> Result<(), Error> {
        if !matches!(self.server, ServerHandle::Inactive) {
            return Err(Error::Startup("setup() was called twice".into()));
        }

        match self.configuration.mode() {
            SessionMode::PerTest => {
                let mut server = MockServer::new();
                server.start(self.configuration.port().unwrap_or(0))?;
                self.server = ServerHandle::Owned(server);
            }
            SessionMode::Global => {
                enter_session()?;
                let result = self.acquire_global_server();
                match result {
                    Ok(server) => self.server = ServerHandle::Global(server),
                    Err(e) => {
                        exit_session();
                        return Err(e);
                    }
                }
            }
        }

        if let Err(e) = self.server_mut()?.clear() {
            self.teardown()?;
            return Err(e);
        }

        Ok(())
    }

    fn acquire_global_server(&self) -> Result<MockServer, Error> {
        let mut slot = GLOBAL_SERVER.lock().map_err(|_| Error::PoisonedLock)?;
        match slot.take() {
            Some(server) => Ok(server),
            None => {
                let mut server = MockServer::new();
                server.start(
                    self.configuration
                        .port()
                        .unwrap_or(DEFAULT_GLOBAL_PORT),
                )?;
                Ok(server)
            }
        }
    }

    fn server_ref(&self) -> Result<&MockServer, Error> {
        match &self.server {
            ServerHandle::Owned(server) | ServerHandle::Global(server) => Ok(server),
            ServerHandle::Inactive => Err(Error::Startup("setup() has not been called".into())),
        }
    }

    fn server_mut(&mut self) -> Result<&mut MockServer, Error> {
        match &mut self.server {
            ServerHandle::Owned(server) | ServerHandle::Global(server) => Ok(server),
            ServerHandle::Inactive => Err(Error::Startup("setup() has not been called".into())),
        }
    }

    /// Register an interaction. Valid between `setup()` and the test body.
    pub fn add_interaction(&mut self, interaction: Interaction) -> Result<(), Error> {
        self.server_mut()?.register(interaction)
    }

    pub fn base_url(&self) -> Option<String> {
        self.server_ref()
            .ok()
            .and_then(|server| server.base_url().map(String::from))
    }

    /// Run the consumer code against the mock. The server only serves while
    /// the body runs; panics are captured so verification and teardown still
    /// happen, and the payload is handed back for the caller to rethrow.
    pub fn execute_test<T, F>(&mut self, test: F) -> Result<std::thread::Result<T>, Error>
    where
        F: FnOnce(&str) -> T,
    {
        let server = self.server_mut()?;
        server.accept_requests()?;
        let base_url = server
            .base_url()
            .map(String::from)
            .unwrap_or_default();

        let result = panic::catch_unwind(AssertUnwindSafe(|| test(&base_url)));

        self.server_mut()?.suspend()?;

        Ok(result)
    }

    /// Assert every registered interaction was exercised at least the
    /// configured number of times and no request went unmatched.
    pub fn verify(&self) -> Result<(), Error> {
        let report = self.server_ref()?.report()?;
        match report.failure(self.configuration.min_exercised()) {
            None => Ok(()),
            Some(failure) => Err(Error::UnverifiedInteractions(failure)),
        }
    }

    /// Serialize the exercised interactions as a contract document.
    pub fn contract(&self) -> Result<Contract, Error> {
        Ok(Contract {
            consumer: self.configuration.consumer().into(),
            provider: self.configuration.provider().into(),
            interactions: self.server_ref()?.interactions()?,
        })
    }

    /// Verify, persist the contract on success (when an output directory is
    /// configured), then tear the server down. Teardown runs on every path.
    pub fn finalize(&mut self) -> Result<(), Error> {
        if matches!(self.server, ServerHandle::Inactive) {
            return Ok(());
        }

        let verification = self.verify();
        let written = match &verification {
            Ok(()) => self.write_contract(),
            Err(_) => Ok(None),
        };

        let teardown = self.teardown();

        verification.and(written.map(|_| ())).and(teardown)
    }

    fn write_contract(&self) -> Result<Option<PathBuf>, Error> {
        match self.configuration.output_dir() {
            Some(dir) => {
                let path = self.contract()?.write_to_dir(dir)?;
                log::debug!("contract written to {}", path.display());
                Ok(Some(path))
            }
            None => Ok(None),
        }
    }

    fn teardown(&mut self) -> Result<(), Error> {
        match std::mem::replace(&mut self.server, ServerHandle::Inactive) {
            ServerHandle::Inactive => Ok(()),
            ServerHandle::Owned(mut server) => server.stop(),
            ServerHandle::Global(mut server) => {
                if server.state() == ServerState::Listening {
                    let _ = server.suspend();
                }
                let result = server.clear();
                match GLOBAL_SERVER.lock() {
                    Ok(mut slot) => *slot = Some(server),
                    Err(_) => drop(server),
                }
                exit_session();
                result
            }
        }
    }
}

impl Drop for Pact {
    fn drop(&mut self) {
        if !matches!(self.server, ServerHandle::Inactive) {
            if let Err(e) = self.teardown() {
                log::warn!("pact teardown: {}", e);
            }
        }
    }
}
