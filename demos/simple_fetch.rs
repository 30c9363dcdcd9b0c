//! Simple fetch example.
//!
//! Every request without a session runs in its own throwaway cookie jar.

use fetchkit::RequestInit;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let profiles = fetchkit::profiles().await?;
    println!("Available profiles: {}", profiles.join(", "));

    println!("Sending request to httpbin.org...");
    let resp = fetchkit::fetch(
        "https://httpbin.org/get",
        RequestInit::new().browser("chrome_142"),
    )
    .await?;

    println!("Status: {} {}", resp.status(), resp.status_text());
    println!("Headers:");
    for (name, value) in resp.headers().iter() {
        println!("  {}: {}", name, value);
    }
    println!("{}", resp.text().await?);

    Ok(())
}
