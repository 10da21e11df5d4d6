//! Example: sign-in flow against a simulated page
//!
//! This example demonstrates how to:
//! 1. Build a client configuration (from `GAPI_*` variables when set)
//! 2. Create the facade over a page that loads the vendor script
//! 3. Sign in, read the current user, issue a request and sign out
//!
//! The page is `gapi_bridge::mock::MockHost`, so nothing leaves the process.
//!
//! ## Running
//!
//! ```bash
//! RUST_LOG=gapi_bridge=debug cargo run --example simulated_sign_in
//! ```

use std::sync::Arc;
use std::time::Duration;

use gapi_bridge::mock::{MockHost, MockProfile, MockUser, ScriptBehavior};
use gapi_bridge::{ClientConfig, Gapi, LoaderConfig, RequestArgs, ScriptLoader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gapi_bridge=debug,simulated_sign_in=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env().unwrap_or_else(|_| {
        ClientConfig::new("demo.apps.googleusercontent.com")
            .with_api_key("demo-key")
            .with_scope("profile email https://www.googleapis.com/auth/drive.readonly")
            .with_discovery_docs(vec![
                "https://www.googleapis.com/discovery/v1/apis/drive/v3/rest".to_string(),
            ])
    });

    let host = Arc::new(MockHost::new(ScriptBehavior::Manual));
    host.prepared()
        .session()
        .set_sign_in_user(MockUser::signed_in(MockProfile::new(
            "108",
            "Grace",
            "Hopper",
            "grace@example.com",
        )));

    let loader = ScriptLoader::new(
        Arc::clone(&host),
        LoaderConfig::google()?.timeout(Duration::from_secs(2)),
    );
    let gapi = Gapi::with_loader(Arc::new(loader), config);

    // Simulate the network delivering the script a little later.
    let page = Arc::clone(&host);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        page.fire_load();
    });

    info!(signed_in = gapi.is_signed_in().await?, "Checked session");

    if let Some(user) = gapi.sign_in().await? {
        info!(name = %user.name, email = %user.email, "Signed in");
    }

    let response = gapi
        .request(RequestArgs::new("https://www.googleapis.com/drive/v3/files").param("pageSize", 10))
        .await?;
    info!(status = response.status, "Listed files");

    gapi.sign_out().await?;
    info!(
        signed_in = gapi.is_signed_in().await?,
        scripts = host.appended(),
        "Signed out"
    );

    Ok(())
}
