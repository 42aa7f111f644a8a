use std::time::Duration;

use anyhow::{Result, anyhow};
use greenlight_server::{
    config::{Parser, ServerConfig},
    run::run_graceful_with_state,
};
use rand::Rng as _;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tracing::info;
use url::Url;

fn random_port() -> Result<u16> {
    let mut rng = rand::rng();

    let mut retries = 3;
    while retries > 0 {
        let port: u16 = rng.random_range(4030..5030);
        let addr: std::net::SocketAddr = format!("127.0.0.1:{}", port).parse()?;
        match std::net::TcpStream::connect_timeout(&addr, Duration::from_millis(100)) {
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => return Ok(port),
            Err(_) => retries -= 1,
            Ok(_) => retries -= 1,
        }
    }

    Err(anyhow!("Could not find a free port"))
}

/// Keeps the temporary database alive and stops the server when dropped.
pub struct TestServer {
    pub base_url: Url,
    shutdown: Option<oneshot::Sender<()>>,
    #[allow(dead_code)]
    data_dir: TempDir,
}

impl TestServer {
    pub fn url(&self, path: &str) -> Url {
        self.base_url.join(path).expect("valid test path")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub fn test_config(test_name: &str, extra_args: &[&str]) -> Result<(ServerConfig, TempDir)> {
    let tmp_data_dir = TempDir::with_prefix(format!("{}_", test_name))?;
    let db_dsn = format!(
        "sqlite://{}",
        tmp_data_dir.path().join("greenlight.db").to_string_lossy()
    );
    let port = random_port()?.to_string();
    let mut args = vec![
        "greenlight-e2e-tests",
        "--listen-address",
        "127.0.0.1",
        "--port",
        &port,
        "--db-dsn",
        &db_dsn,
    ];
    args.extend_from_slice(extra_args);
    let config = ServerConfig::try_parse_from(args)?;
    Ok((config, tmp_data_dir))
}

async fn wait_for_server(url: &Url) -> Result<()> {
    let client = reqwest::Client::new();
    for _ in 0..50 {
        if let Ok(response) = client.get(url.clone()).send().await {
            if response.status().is_success() {
                return Ok(());
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Err(anyhow!("Server did not start"))
}

pub async fn spawn_server(test_name: &str, extra_args: &[&str]) -> Result<TestServer> {
    let (args, data_dir) = test_config(test_name, extra_args)?;
    let base_url = Url::parse(&format!("http://127.0.0.1:{}/", args.port))?;
    let state = greenlight_server::build_state(&args).await?;

    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let shutdown = async {
            let _ = rx.await;
        };
        if let Err(e) = run_graceful_with_state(args, state, shutdown).await {
            tracing::error!("Test server failed: {e}");
        }
    });

    wait_for_server(&base_url.join("v1/healthcheck")?).await?;
    info!("Test server {test_name} is running at {base_url}");

    Ok(TestServer {
        base_url,
        shutdown: Some(tx),
        data_dir,
    })
}

pub async fn create_movie(
    client: &reqwest::Client,
    server: &TestServer,
    payload: &serde_json::Value,
) -> Result<serde_json::Value> {
    let response = client
        .post(server.url("v1/movies"))
        .json(payload)
        .send()
        .await?;
    if response.status().as_u16() != 201 {
        return Err(anyhow!("Unexpected status {}", response.status()));
    }
    let mut body: serde_json::Value = response.json().await?;
    Ok(body["movie"].take())
}
