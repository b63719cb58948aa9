//! HTTP producer: posts records to the relay's `/log` endpoint.
//!
//! A failed post pauses the logger for a cool-down so an unreachable relay
//! costs one timeout, not one per record.

use std::future::Future;
use std::panic::Location;
use std::time::Duration;

use logrelay_core::{LogLevel, LogRecord};
use logrelay_settings::ClientSettings;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::ClientError;

/// Connect and request timeout for each post.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Producer configuration.
#[derive(Clone, Debug)]
pub struct ProducerConfig {
    /// Relay ingress URL.
    pub url: String,
    /// Pause after a failed post.
    pub cooldown: Duration,
    /// Records below this level are not sent.
    pub min_level: LogLevel,
    /// Connect and request timeout.
    pub timeout: Duration,
}

impl ProducerConfig {
    /// Build from loaded client settings.
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self {
            url: settings.producer_url.clone(),
            cooldown: Duration::from_millis(settings.producer_cooldown_ms),
            min_level: LogLevel::Trace,
            timeout: REQUEST_TIMEOUT,
        }
    }
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self::from_settings(&ClientSettings::default())
    }
}

/// Callback run for every record that passes the level filter.
pub type RecordHandler = Box<dyn Fn(&LogRecord) + Send + Sync>;

/// Posts log records to the relay.
pub struct RelayLogger {
    http: reqwest::Client,
    config: ProducerConfig,
    handlers: Vec<RecordHandler>,
    suppressed_until: Mutex<Option<Instant>>,
}

impl RelayLogger {
    /// Create a logger.
    pub fn new(config: ProducerConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http,
            config,
            handlers: Vec::new(),
            suppressed_until: Mutex::new(None),
        })
    }

    /// Run `handler` on every record before it is posted.
    ///
    /// Handlers see records even while posting is suppressed.
    pub fn add_handler(&mut self, handler: impl Fn(&LogRecord) + Send + Sync + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// The logger's configuration.
    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    /// Post a record.
    ///
    /// Records below `min_level` are skipped and return `Ok`. Handlers run
    /// next. While cooling down after a failure nothing is sent and
    /// [`ClientError::Suppressed`] is returned.
    pub async fn send(&self, record: LogRecord) -> Result<(), ClientError> {
        if let Ok(level) = record.level() {
            if level < self.config.min_level {
                return Ok(());
            }
        }
        for handler in &self.handlers {
            handler(&record);
        }
        if let Some(remaining) = self.cooldown_remaining() {
            return Err(ClientError::Suppressed { remaining });
        }

        let response = match self.http.post(&self.config.url).json(&record).send().await {
            Ok(response) => response,
            Err(e) => {
                self.start_cooldown();
                warn!(
                    error = %e,
                    cooldown_ms = u64::try_from(self.config.cooldown.as_millis()).unwrap_or(u64::MAX),
                    "failed to reach relay, pausing log forwarding"
                );
                return Err(e.into());
            }
        };

        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), "record posted");
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    /// Build and post a record with an explicit source location.
    pub async fn log(
        &self,
        level: LogLevel,
        file: &str,
        function: &str,
        line_no: u32,
        message: &str,
    ) -> Result<(), ClientError> {
        self.send(LogRecord::new(level, file, function, line_no, message))
            .await
    }

    /// Post at TRACE from the caller's location.
    #[track_caller]
    pub fn trace<'a>(&'a self, message: &str) -> impl Future<Output = Result<(), ClientError>> + 'a {
        self.at_caller(LogLevel::Trace, message)
    }

    /// Post at DEBUG from the caller's location.
    #[track_caller]
    pub fn debug<'a>(&'a self, message: &str) -> impl Future<Output = Result<(), ClientError>> + 'a {
        self.at_caller(LogLevel::Debug, message)
    }

    /// Post at INFO from the caller's location.
    #[track_caller]
    pub fn info<'a>(&'a self, message: &str) -> impl Future<Output = Result<(), ClientError>> + 'a {
        self.at_caller(LogLevel::Info, message)
    }

    /// Post at SUCCESS from the caller's location.
    #[track_caller]
    pub fn success<'a>(&'a self, message: &str) -> impl Future<Output = Result<(), ClientError>> + 'a {
        self.at_caller(LogLevel::Success, message)
    }

    /// Post at WARNING from the caller's location.
    #[track_caller]
    pub fn warning<'a>(&'a self, message: &str) -> impl Future<Output = Result<(), ClientError>> + 'a {
        self.at_caller(LogLevel::Warning, message)
    }

    /// Post at ERROR from the caller's location.
    #[track_caller]
    pub fn error<'a>(&'a self, message: &str) -> impl Future<Output = Result<(), ClientError>> + 'a {
        self.at_caller(LogLevel::Error, message)
    }

    /// Post at CRITICAL from the caller's location.
    #[track_caller]
    pub fn critical<'a>(&'a self, message: &str) -> impl Future<Output = Result<(), ClientError>> + 'a {
        self.at_caller(LogLevel::Critical, message)
    }

    // The record is built before the future is returned so the location is
    // the caller's, not the executor's.
    #[track_caller]
    fn at_caller<'a>(
        &'a self,
        level: LogLevel,
        message: &str,
    ) -> impl Future<Output = Result<(), ClientError>> + 'a {
        let location = Location::caller();
        let record = LogRecord::new(level, location.file(), "-", location.line(), message);
        self.send(record)
    }

    fn cooldown_remaining(&self) -> Option<Duration> {
        let mut guard = self.suppressed_until.lock();
        let until = (*guard)?;
        let now = Instant::now();
        if now >= until {
            *guard = None;
            return None;
        }
        Some(until - now)
    }

    fn start_cooldown(&self) {
        *self.suppressed_until.lock() = Some(Instant::now() + self.config.cooldown);
    }
}

/// Post a record with the caller's file, module and line.
///
/// ```ignore
/// relay_log!(logger, LogLevel::Info, "user {} logged in", user_id).await?;
/// ```
#[macro_export]
macro_rules! relay_log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log(
            $level,
            file!(),
            module_path!(),
            line!(),
            &format!($($arg)+),
        )
    };
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use logrelay_core::decode_message;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn logger(url: String, min_level: LogLevel) -> RelayLogger {
        RelayLogger::new(ProducerConfig {
            url,
            cooldown: Duration::from_secs(60),
            min_level,
            timeout: REQUEST_TIMEOUT,
        })
        .unwrap()
    }

    fn unused_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}/log")
    }

    #[tokio::test]
    async fn posts_encoded_record_with_caller_location() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/log"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let logger = logger(format!("{}/log", server.uri()), LogLevel::Trace);
        logger.warning("queue backed up").await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["level"], "WARNING");
        assert_eq!(
            decode_message(body["message"].as_str().unwrap()).unwrap(),
            "queue backed up"
        );
        assert!(body["file"].as_str().unwrap().ends_with("producer.rs"));
        assert!(body["timestamp"].is_f64());
    }

    #[tokio::test]
    async fn macro_records_module_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let logger = logger(format!("{}/log", server.uri()), LogLevel::Trace);
        relay_log!(logger, LogLevel::Info, "order {} shipped", 42)
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["function"], module_path!());
        assert_eq!(
            decode_message(body["message"].as_str().unwrap()).unwrap(),
            "order 42 shipped"
        );
    }

    #[tokio::test]
    async fn records_below_min_level_are_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let logger = logger(format!("{}/log", server.uri()), LogLevel::Warning);
        logger.debug("noise").await.unwrap();
        logger.info("more noise").await.unwrap();
    }

    #[tokio::test]
    async fn rejection_does_not_start_cooldown() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad level"))
            .expect(2)
            .mount(&server)
            .await;

        let logger = logger(format!("{}/log", server.uri()), LogLevel::Trace);
        for _ in 0..2 {
            match logger.info("x").await {
                Err(ClientError::Rejected { status, body }) => {
                    assert_eq!(status, 400);
                    assert_eq!(body, "bad level");
                }
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn unreachable_relay_suppresses_further_posts() {
        let logger = logger(unused_url(), LogLevel::Trace);

        assert!(matches!(logger.error("first").await, Err(ClientError::Http(_))));
        match logger.error("second").await {
            Err(ClientError::Suppressed { remaining }) => {
                assert!(remaining <= Duration::from_secs(60));
                assert!(remaining > Duration::from_secs(50));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn handlers_see_filtered_records_even_while_suppressed() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut logger = logger(unused_url(), LogLevel::Info);
        logger.add_handler({
            let seen = seen.clone();
            move |record: &LogRecord| {
                seen.lock().push(record.message_text().unwrap());
            }
        });

        logger.debug("below threshold").await.unwrap();
        assert!(logger.info("first").await.is_err());
        assert!(matches!(
            logger.info("second").await,
            Err(ClientError::Suppressed { .. })
        ));

        assert_eq!(*seen.lock(), vec!["first".to_string(), "second".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_expires() {
        let logger = logger(unused_url(), LogLevel::Trace);
        logger.start_cooldown();
        assert!(logger.cooldown_remaining().is_some());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(logger.cooldown_remaining().is_none());
    }
}
