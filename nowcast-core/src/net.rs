//! HTTP transport with a command-line fallback.
//!
//! Every upstream call goes through [`Transport`]: the in-process client is
//! tried first and `curl` second, both with proxies disabled. Callers only
//! ever see [`NetworkError`], so resolver code does not care which path
//! produced the bytes.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::{
    fmt::Debug,
    process::Stdio,
    sync::{Arc, Once},
    time::{Duration, Instant},
};
use tokio::process::Command;

use crate::{
    Config,
    error::{FetchFailure, NetworkError, Stage},
};

const PROXY_VARS: &[&str] = &[
    "http_proxy",
    "https_proxy",
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "all_proxy",
    "ALL_PROXY",
];

/// Slack given to the fetch command on top of its own `-m` limit.
const COMMAND_GRACE: Duration = Duration::from_millis(500);

/// curl's exit status for "operation timed out".
const CURL_TIMEOUT_EXIT: i32 = 28;

static SCRUB_PROXY_ENV: Once = Once::new();

/// Clear proxy settings from the process environment and disable proxying
/// for everything.
///
/// This mutates global state exactly once per process. It must run before
/// any other thread exists, i.e. first thing in `main` before the async
/// runtime is built. Later calls are no-ops.
pub fn scrub_proxy_env() {
    SCRUB_PROXY_ENV.call_once(|| {
        for var in PROXY_VARS {
            // SAFETY: only reached from `main` before any other thread is spawned.
            unsafe { std::env::remove_var(var) };
        }
        // SAFETY: as above.
        unsafe {
            std::env::set_var("no_proxy", "*");
            std::env::set_var("NO_PROXY", "*");
        }
    });
}

/// One GET request.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub url: String,
    pub timeout: Duration,
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    fn has_user_agent(&self) -> bool {
        self.headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("user-agent"))
    }
}

/// A way of turning a [`FetchRequest`] into response bytes.
#[async_trait]
pub trait Fetcher: Send + Sync + Debug {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<u8>, FetchFailure>;
}

/// In-process HTTP client that never goes through a proxy.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self, reqwest::Error> {
        let http = Client::builder().no_proxy().user_agent(user_agent).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<u8>, FetchFailure> {
        let mut builder = self.http.get(&request.url).timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let res = builder
            .send()
            .await
            .map_err(|e| classify_reqwest(&e, request.timeout))?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchFailure::Status(status.as_u16()));
        }

        let body = res
            .bytes()
            .await
            .map_err(|e| classify_reqwest(&e, request.timeout))?;

        Ok(body.to_vec())
    }
}

fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, FetchFailure> {
    serde_json::from_slice(body).map_err(|e| FetchFailure::Body(format!("malformed JSON: {e}")))
}

fn classify_reqwest(err: &reqwest::Error, timeout: Duration) -> FetchFailure {
    if err.is_timeout() {
        FetchFailure::Timeout(timeout)
    } else if err.is_connect() || err.is_request() || err.is_builder() {
        FetchFailure::Connect(err.to_string())
    } else {
        FetchFailure::Body(err.to_string())
    }
}

/// Fetch by running `curl` as a child process with a proxy-free environment.
#[derive(Debug, Clone)]
pub struct CommandFetcher {
    program: String,
    user_agent: String,
}

impl CommandFetcher {
    pub fn curl(user_agent: impl Into<String>) -> Self {
        Self::with_program("curl", user_agent)
    }

    pub fn with_program(program: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            user_agent: user_agent.into(),
        }
    }

    fn args(&self, request: &FetchRequest) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-s".into(),
            "-S".into(),
            "--fail".into(),
            "-m".into(),
            format!("{:.1}", request.timeout.as_secs_f64()),
            "--noproxy".into(),
            "*".into(),
        ];

        if !request.has_user_agent() {
            args.push("-A".into());
            args.push(self.user_agent.clone());
        }
        for (name, value) in &request.headers {
            args.push("-H".into());
            args.push(format!("{name}: {value}"));
        }

        args.push(request.url.clone());
        args
    }

    fn command(&self, request: &FetchRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for var in PROXY_VARS {
            cmd.env_remove(var);
        }
        cmd.env("no_proxy", "*");
        cmd
    }
}

#[async_trait]
impl Fetcher for CommandFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<u8>, FetchFailure> {
        let mut cmd = self.command(request);

        let limit = request.timeout + COMMAND_GRACE;
        let output = match tokio::time::timeout(limit, cmd.output()).await {
            Err(_) => return Err(FetchFailure::Timeout(limit)),
            Ok(Err(e)) => return Err(FetchFailure::Spawn(e.to_string())),
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            if output.status.code() == Some(CURL_TIMEOUT_EXIT) {
                return Err(FetchFailure::Timeout(request.timeout));
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FetchFailure::Exit(format!(
                "{}: {}",
                output.status,
                stderr.trim()
            )));
        }

        if output.stdout.is_empty() {
            return Err(FetchFailure::Body("empty response".to_string()));
        }

        Ok(output.stdout)
    }
}

/// Primary fetcher with a fixed fallback behind it.
#[derive(Debug, Clone)]
pub struct Transport {
    primary: Arc<dyn Fetcher>,
    fallback: Arc<dyn Fetcher>,
}

impl Transport {
    pub fn new(primary: Arc<dyn Fetcher>, fallback: Arc<dyn Fetcher>) -> Self {
        Self { primary, fallback }
    }

    /// `reqwest` first, `curl` second.
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let primary = HttpFetcher::new(&config.user_agent)?;
        let fallback = CommandFetcher::curl(config.user_agent.clone());
        Ok(Self::new(Arc::new(primary), Arc::new(fallback)))
    }

    /// Try the primary path, then the fallback. The error, if any, comes
    /// from the fallback stage.
    pub async fn fetch(&self, request: &FetchRequest) -> Result<Vec<u8>, NetworkError> {
        self.fetch_decoded(request, |body| Ok(body.to_vec())).await
    }

    /// Like [`Transport::fetch`], but a primary body that is not valid JSON
    /// for `T` counts as a primary failure and is retried on the fallback.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: &FetchRequest,
    ) -> Result<T, NetworkError> {
        self.fetch_decoded(request, decode_json).await
    }

    async fn fetch_decoded<T>(
        &self,
        request: &FetchRequest,
        decode: impl Fn(&[u8]) -> Result<T, FetchFailure>,
    ) -> Result<T, NetworkError> {
        let started = Instant::now();
        let primary = self
            .primary
            .fetch(request)
            .await
            .and_then(|body| decode(&body));

        match primary {
            Ok(value) => {
                tracing::debug!(
                    url = %request.url,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "fetched"
                );
                return Ok(value);
            }
            Err(failure) => tracing::debug!(
                url = %request.url,
                stage = %Stage::Primary,
                elapsed_ms = started.elapsed().as_millis() as u64,
                %failure,
                "fetch failed, falling back to command"
            ),
        }

        let body = self.fetch_via_command(request).await?;
        decode(&body).map_err(|failure| {
            let err = NetworkError::new(Stage::Fallback, &request.url, failure);
            tracing::debug!(error = %err, "fallback body rejected");
            err
        })
    }

    /// Skip the in-process client and use the fallback path only.
    pub async fn fetch_via_command(
        &self,
        request: &FetchRequest,
    ) -> Result<Vec<u8>, NetworkError> {
        let started = Instant::now();
        let result = self.fallback.fetch(request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(body) => {
                tracing::debug!(
                    url = %request.url,
                    stage = %Stage::Fallback,
                    elapsed_ms,
                    "fetched"
                );
                Ok(body)
            }
            Err(failure) => {
                let err = NetworkError::new(Stage::Fallback, &request.url, failure);
                tracing::debug!(elapsed_ms, error = %err, "fetch failed");
                Err(err)
            }
        }
    }
}
