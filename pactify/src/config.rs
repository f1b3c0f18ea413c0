use std::path::{Path, PathBuf};

/// How a `Pact` controller acquires its mock server.
///
/// `PerTest` gives every scenario its own server on an ephemeral port, so
/// scenarios may run in parallel. `Global` shares one server on a fixed port
/// across the whole test binary; scenarios are serialized by a session lock.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SessionMode {
    PerTest,
    Global,
}

/// Settings for one contract-testing scenario.
#[derive(Debug, Clone)]
pub struct PactConfiguration {
    consumer: String,
    provider: String,
    mode: SessionMode,
    port: Option<u16>,
    output_dir: Option<PathBuf>,
    min_exercised: usize,
}

impl PactConfiguration {
    pub fn new<C: Into<String>, P: Into<String>>(consumer: C, provider: P) -> Self {
        Self {
            consumer: consumer.into(),
            provider: provider.into(),
            mode: SessionMode::PerTest,
            port: None,
            output_dir: None,
            min_exercised: 1,
        }
    }

    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    pub fn set_consumer<S: Into<String>>(&mut self, consumer: S) {
        self.consumer = consumer.into();
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn set_provider<S: Into<String>>(&mut self, provider: S) {
        self.provider = provider.into();
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: SessionMode) {
        self.mode = mode;
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Pin the mock server to a fixed port instead of an ephemeral one.
    pub fn set_port(&mut self, port: u16) {
        self.port = Some(port);
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    /// Write the contract document to this directory when a scenario
    /// verifies successfully.
    pub fn set_output_dir<P: Into<PathBuf>>(&mut self, dir: P) {
        self.output_dir = Some(dir.into());
    }

    pub fn min_exercised(&self) -> usize {
        self.min_exercised
    }

    /// Require every interaction to be exercised at least this many times
    /// (default 1).
    pub fn set_min_exercised(&mut self, min: usize) {
        self.min_exercised = min;
    }
}

impl Default for PactConfiguration {
    fn default() -> Self {
        Self::new("consumer", "provider")
    }
}
