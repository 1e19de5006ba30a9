/// Smoke-test for `ChromiumLauncher`.
///
/// Launches a stealth Chromium session, opens <https://example.com>, and
/// checks the rendered body text and markup through the driver-facing page
/// API, then closes the session.
///
/// Run with:
///   cargo run --example browser_smoke --features browser
use std::time::Duration;

use trackline_client::ChromiumLauncher;
use trackline_core::browser::{BODY, LoadState, WaitTarget};
use trackline_core::BrowserLauncher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let headless = std::env::var("TRACKLINE_HEADLESS").map_or(true, |v| v != "false");
    let launcher = ChromiumLauncher::new(headless)
        .with_chrome_bin(std::env::var("CHROME_BIN").ok().map(Into::into));

    println!("Launching browser session…");
    let session = launcher.launch().await?;
    let page = session.page();

    let url = "https://example.com";
    println!("Opening {url} …");
    page.goto(url, Duration::from_secs(30)).await?;
    let idle = page
        .wait_for(&WaitTarget::Load(LoadState::NetworkIdle), Duration::from_secs(10))
        .await?;
    println!("Network idle: {}", idle.matched());

    let text = page.inner_text(&BODY).await?;
    let html = page.content().await?;
    session.close().await?;

    assert!(
        text.contains("Example Domain"),
        "Expected heading not found in body text"
    );
    assert!(
        html.len() > 500,
        "HTML suspiciously short ({} bytes)",
        html.len()
    );

    println!("OK: {} chars of text, {} bytes of markup", text.len(), html.len());
    Ok(())
}
