//! LtiGate Server - LTI 1.0 launch gateway.
//!
//! Accepts basic LTI launches from tool consumers, verifies their OAuth 1.0
//! signature, and binds the admitted user to a browser session.
//!
//! # Usage
//!
//! ```text
//! LTI_CONSUMERS=moodle:s3cret GATEWAY_LISTEN=0.0.0.0:8080 ltigate-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GATEWAY_LISTEN` | `0.0.0.0:8080` | Bind address |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |
//! | `LTI_LAUNCH_PATH` | `/launch` | Path consumers post launches to |
//! | `LTI_PUBLIC_SCHEME` | `https` | Scheme of the URL consumers sign |
//! | `LTI_WELCOME_URL` | `/welcome` | Redirect after an admitted launch |
//! | `LTI_ERROR_URL` | `/error` | Redirect after a rejected launch |
//! | `LTI_SESSION_COOKIE` | `ltigate_session` | Session cookie name |
//! | `LTI_SESSION_TTL_SECS` | `3600` | Session lifetime |
//! | `LTI_CONSUMERS` | *(empty)* | Comma-separated `key:secret` pairs |

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use ltigate_auth::StaticCredentialProvider;
use ltigate_core::LtiGateConfig;
use ltigate_http::{HEALTH_PATH, LaunchHttpConfig, LaunchHttpService};
use ltigate_launch::{InMemorySessionStore, LaunchOrchestrator};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How often expired sessions are swept from memory.
const SESSION_SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(60);

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Build the consumer registry from the configured `key:secret` pairs.
fn build_credential_provider(config: &LtiGateConfig) -> StaticCredentialProvider {
    let provider = StaticCredentialProvider::new(config.consumers.iter().cloned());
    if provider.is_empty() {
        warn!("no LTI consumers configured; every launch will be rejected");
    } else {
        let keys: Vec<&str> = config.consumers.iter().map(|(k, _)| k.as_str()).collect();
        info!(consumers = ?keys, "configured LTI consumers");
    }
    provider
}

/// Wire the launch pipeline from configuration.
fn build_orchestrator(
    config: &LtiGateConfig,
    sessions: Arc<InMemorySessionStore>,
) -> Result<LaunchOrchestrator> {
    let ttl_secs = i64::try_from(config.session_ttl_secs)
        .context("LTI_SESSION_TTL_SECS is out of range")?;
    let ttl = chrono::Duration::try_seconds(ttl_secs)
        .context("LTI_SESSION_TTL_SECS is out of range")?;

    Ok(LaunchOrchestrator::new(
        Arc::new(build_credential_provider(config)),
        sessions,
        ttl,
    ))
}

/// Periodically drop expired sessions so abandoned ones do not accumulate.
fn spawn_session_sweeper(sessions: Arc<InMemorySessionStore>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let purged = sessions.purge_expired(chrono::Utc::now());
            if purged > 0 {
                debug!(purged, remaining = sessions.len(), "swept expired sessions");
            }
        }
    });
}

/// Serve one accepted connection on its own task, tracked by `graceful`.
fn spawn_connection(
    http: &HttpConnBuilder<TokioExecutor>,
    graceful: &GracefulShutdown,
    stream: TcpStream,
    peer_addr: SocketAddr,
    service: LaunchHttpService,
) {
    let conn = graceful.watch(
        http.serve_connection(TokioIo::new(stream), service)
            .into_owned(),
    );
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            error!(peer_addr = %peer_addr, error = %e, "connection error");
        }
    });
}

/// Accept connections until `shutdown` resolves, then drain in-flight ones.
async fn serve(
    listener: TcpListener,
    service: LaunchHttpService,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let graceful = GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr)) => {
                    spawn_connection(&http, &graceful, stream, peer_addr, service.clone());
                }
                Err(e) => warn!(error = %e, "failed to accept connection"),
            },
            () = &mut shutdown => break,
        }
    }

    info!("draining open connections");
    graceful.shutdown().await;
    info!("all connections drained, exiting");
    Ok(())
}

/// Resolves on Ctrl-C.
async fn ctrl_c() {
    tokio::signal::ctrl_c().await.ok();
    info!("received shutdown signal");
}

/// Perform a health check by connecting to the gateway and requesting the health endpoint.
///
/// Exits with code 0 if the response is 200 OK and reports the server as
/// running, 1 otherwise.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    writer.write_all(health_request(addr).as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if is_healthy_response(&response) {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

fn health_request(addr: &str) -> String {
    format!("GET {HEALTH_PATH} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n")
}

fn is_healthy_response(response: &str) -> bool {
    response.contains("200 OK") && response.contains("\"running\"")
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = LtiGateConfig::from_env().context("failed to load configuration")?;

    // Handle --health-check flag for Docker HEALTHCHECK.
    if std::env::args().any(|a| a == "--health-check") {
        let addr = config.gateway_listen.replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    init_tracing(&config.log_level)?;

    let sessions = Arc::new(InMemorySessionStore::new());
    let orchestrator = build_orchestrator(&config, Arc::clone(&sessions))?;
    spawn_session_sweeper(sessions);

    let service = LaunchHttpService::new(Arc::new(orchestrator), LaunchHttpConfig::from(&config));

    let addr: SocketAddr = config
        .gateway_listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.gateway_listen))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(
        %addr,
        launch_path = %config.launch_path,
        public_scheme = %config.public_scheme,
        session_ttl_secs = config.session_ttl_secs,
        version = VERSION,
        "starting LtiGate Server",
    );

    serve(listener, service, ctrl_c()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_consumers(consumers: &[(&str, &str)]) -> LtiGateConfig {
        LtiGateConfig {
            consumers: consumers
                .iter()
                .map(|(k, s)| ((*k).to_owned(), (*s).to_owned()))
                .collect(),
            ..LtiGateConfig::default()
        }
    }

    #[test]
    fn test_should_build_credential_provider_from_config() {
        let provider =
            build_credential_provider(&config_with_consumers(&[("moodle", "a"), ("canvas", "b")]));
        assert_eq!(provider.len(), 2);
        assert!(build_credential_provider(&LtiGateConfig::default()).is_empty());
    }

    #[test]
    fn test_should_reject_out_of_range_ttl() {
        let config = LtiGateConfig {
            session_ttl_secs: u64::MAX,
            ..LtiGateConfig::default()
        };
        assert!(build_orchestrator(&config, Arc::new(InMemorySessionStore::new())).is_err());
    }

    #[test]
    fn test_should_build_orchestrator_from_default_config() {
        let sessions = Arc::new(InMemorySessionStore::new());
        let orchestrator =
            build_orchestrator(&config_with_consumers(&[("moodle", "a")]), sessions).unwrap();
        assert!(format!("{orchestrator:?}").contains("session_ttl"));
    }

    #[tokio::test]
    async fn test_should_serve_health_until_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let orchestrator =
            build_orchestrator(&LtiGateConfig::default(), Arc::new(InMemorySessionStore::new()))
                .unwrap();
        let service =
            LaunchHttpService::new(Arc::new(orchestrator), LaunchHttpConfig::default());

        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, service, async {
            stopped.await.ok();
        }));

        run_health_check(&addr).await.unwrap();

        stop.send(()).unwrap();
        server.await.unwrap().unwrap();
        assert!(run_health_check(&addr).await.is_err());
    }

    #[test]
    fn test_should_request_health_path() {
        let request = health_request("127.0.0.1:8080");
        assert!(request.starts_with("GET /health HTTP/1.1\r\n"));
        assert!(request.contains("Host: 127.0.0.1:8080"));
    }

    #[test]
    fn test_should_detect_healthy_response() {
        assert!(is_healthy_response(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\r\n{\"status\":\"running\"}"
        ));
        assert!(!is_healthy_response("HTTP/1.1 404 Not Found\r\n\r\n"));
    }
}
