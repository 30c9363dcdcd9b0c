use fetchkit::{Client, NetError, RequestInit, SessionOptions};

#[tokio::main]
async fn main() -> Result<(), NetError> {
    let client = Client::new();

    let body = client
        .with_session(SessionOptions::new().browser("firefox_139"), |session| async move {
            println!("--- Step 1: Setting cookie ---");
            let resp = session
                .fetch(
                    "https://httpbin.org/cookies/set?test_cookie=hello_fetchkit",
                    RequestInit::new(),
                )
                .await?;
            println!("Step 1 Status: {} (redirected: {})", resp.status(), resp.redirected());

            println!("\n--- Step 2: Verifying cookie ---");
            let resp = session
                .fetch("https://httpbin.org/cookies", RequestInit::new())
                .await?;
            resp.text().await
        })
        .await?;
    println!("Session saw: {body}");

    println!("\n--- Step 3: Same URL without a session ---");
    let resp = client
        .fetch("https://httpbin.org/cookies", RequestInit::new())
        .await?;
    println!("Ephemeral request saw: {}", resp.text().await?);

    Ok(())
}
