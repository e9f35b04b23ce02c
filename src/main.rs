use visa_portal::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    visa_portal::init_tracing();

    let config = AppConfig::from_env();
    visa_portal::serve(config).await
}
