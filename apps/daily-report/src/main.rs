use std::time::Duration;

use chrono::Local;
use daily_report::{Config, ContentFetcher, Delivery, FetchOutcome, Notifier};
use gemini_engine::init_logging;
use tracing::{error, info};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_logging();

    if let Err(e) = run().await {
        error!(error = %e, "Daily report failed");
        println!("❌ 早报运行失败：{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), BoxError> {
    let config = Config::from_env();
    info!(
        has_api_key = config.gemini_api_key.is_some(),
        has_webhook = config.webhook_url.is_some(),
        "Starting Daily Report"
    );

    // Shared HTTP client (reused for connection pooling)
    let http_client = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    let today = Local::now().date_naive();

    let fetcher = ContentFetcher::from_config(&config, http_client.clone());
    let outcome = fetcher.fetch(today).await;
    match &outcome {
        FetchOutcome::Generated { strategy, .. } => {
            println!("✅ 内容生成成功（模型：{}，联网搜索：{}）", strategy.model, strategy.search)
        }
        FetchOutcome::Fallback(_) => println!("⚠️ 所有模型均失败，使用备用内容"),
        FetchOutcome::MissingApiKey(_) => println!("⚠️ 未配置 GEMINI_API_KEY，使用占位内容"),
    }

    let notifier = Notifier::new(http_client, config.webhook_url.clone());
    match notifier.send(outcome.record(), today).await {
        Ok(Delivery::Delivered { .. }) => println!("发送成功！去飞书看看吧。"),
        Ok(Delivery::Skipped) => println!("⚠️ 未配置 FEISHU_WEBHOOK_URL，跳过发送"),
        Err(e) => {
            error!(error = %e, "Failed to deliver report card");
            println!("发送失败：{}", e);
        }
    }

    info!("Daily Report completed");
    Ok(())
}
