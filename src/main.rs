use std::sync::Arc;

use newsletter_engine::api::{self, DEFAULT_DAYS_BACK};
use newsletter_engine::channels::document::{DocumentSink, FileDocumentSink};
use newsletter_engine::channels::email::Mailer;
use newsletter_engine::channels::slack::SlackClient;
use newsletter_engine::config::{
    DocumentConfig, EngineConfig, MailConfig, ServerConfig, SlackConfig,
};
use newsletter_engine::delivery::{DocumentOutcome, MailOutcome, Publisher};
use newsletter_engine::newsletter;
use newsletter_engine::pipeline::processor::NewsletterEngine;

const USAGE: &str = "Usage: newsletter-engine [serve | generate [days_back]]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("serve");

    let slack_config = SlackConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export SLACK_BOT_TOKEN=xoxb-...");
        std::process::exit(1);
    });
    let engine_config = EngineConfig::from_env();

    let slack = Arc::new(SlackClient::new(&slack_config)?);
    let engine = Arc::new(NewsletterEngine::new(
        slack.clone(),
        slack,
        &engine_config,
    )?);
    let documents = DocumentConfig::from_env()
        .map(|config| Arc::new(FileDocumentSink::new(&config)) as Arc<dyn DocumentSink>);
    let publisher = Publisher::new(documents, MailConfig::from_env().map(Mailer::new));

    match command {
        "serve" => serve(engine, publisher).await,
        "generate" => {
            let days_back = match args.get(1) {
                Some(raw) => raw.parse::<i64>().unwrap_or_else(|_| {
                    eprintln!("Error: days_back must be an integer, got {raw:?}");
                    std::process::exit(2);
                }),
                None => DEFAULT_DAYS_BACK,
            };
            generate(&engine, &publisher, days_back).await
        }
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }
}

/// Log whether each collaborator accepts our credentials. Never fatal.
async fn check_connections(engine: &NewsletterEngine, publisher: &Publisher) {
    match engine.check_connection().await {
        Ok(identity) => tracing::info!(
            source = engine.source_name(),
            workspace = %identity.workspace,
            user = %identity.user,
            "Chat source connected"
        ),
        Err(e) => tracing::warn!(source = engine.source_name(), error = %e, "Chat source check failed"),
    }

    if let Some(mailer) = publisher.mailer()
        && let Err(e) = mailer.check_connection().await
    {
        tracing::warn!(error = %e, "SMTP check failed, mail delivery may not work");
    }
}

async fn serve(
    engine: Arc<NewsletterEngine>,
    publisher: Publisher,
) -> Result<(), Box<dyn std::error::Error>> {
    let server = ServerConfig::from_env();

    eprintln!("📰 Newsletter Engine v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Source: {}", engine.source_name());
    eprintln!(
        "   Topics: {}",
        engine
            .classifier()
            .rules()
            .iter()
            .map(|r| r.topic.label())
            .collect::<Vec<_>>()
            .join(" > ")
    );
    match publisher.mailer() {
        Some(m) => eprintln!("   Mail: {} recipient(s)", m.recipients().len()),
        None => eprintln!("   Mail: disabled"),
    }
    eprintln!(
        "   Documents: {}",
        if publisher.documents_enabled() { "enabled" } else { "disabled" }
    );
    eprintln!("   API: http://0.0.0.0:{}/api/channels\n", server.port);

    check_connections(&engine, &publisher).await;

    let app = api::routes(engine, publisher);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", server.port)).await?;
    tracing::info!(port = server.port, "Newsletter API server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}

async fn generate(
    engine: &NewsletterEngine,
    publisher: &Publisher,
    days_back: i64,
) -> Result<(), Box<dyn std::error::Error>> {
    check_connections(engine, publisher).await;
    let report = engine.generate_newsletter(days_back).await?;
    let subject = newsletter::subject(&report);
    let text = newsletter::render(&report);

    println!("{}", serde_json::to_string_pretty(&report)?);
    println!("\n{subject}\n\n{text}");

    eprintln!("\n🎉 Newsletter generated");
    eprintln!("   Run: {}", report.run_id);
    eprintln!("   Status: {:?}", report.status);
    eprintln!(
        "   Channels: {} processed, {} failed",
        report.totals.channels_processed, report.totals.channels_failed
    );
    eprintln!(
        "   Messages: {} total, {} important",
        report.totals.total_messages, report.totals.important_messages
    );

    let send = publisher.mailer().is_some();
    let delivery = publisher.deliver(&report, &subject, &text, send).await;
    match &delivery.document {
        DocumentOutcome::Published { document } => eprintln!("   Document: {}", document.url),
        DocumentOutcome::Failed { message, .. } => eprintln!("   Document failed: {message}"),
        DocumentOutcome::Skipped => {}
    }
    match &delivery.mail {
        MailOutcome::Sent { recipients, .. } => eprintln!("   Emailed to {recipients} recipient(s)"),
        MailOutcome::Failed { message, .. } => {
            eprintln!("   Email failed: {message}");
            std::process::exit(1);
        }
        MailOutcome::Skipped => {}
    }
    Ok(())
}
