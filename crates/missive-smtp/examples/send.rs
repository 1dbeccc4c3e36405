//! Sends one message using settings from the environment.
//!
//! ```text
//! SMTP_HOST=smtp.example.com SMTP_SECURITY=starttls \
//! SMTP_USER=alice@example.com SMTP_PASSWORD=secret \
//! MAIL_FROM=alice@example.com MAIL_TO=bob@example.org \
//! cargo run -p missive-smtp --example send
//! ```

use std::env;

use missive_smtp::mime::{Email, Recipient};
use missive_smtp::{Config, Credentials, Mailer, Security};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn var(name: &str) -> Result<String, Box<dyn std::error::Error>> {
    env::var(name).map_err(|e| format!("{name}: {e}").into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "send=info,missive_smtp=debug,missive_mime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let security = match env::var("SMTP_SECURITY").as_deref() {
        Ok("none") => Security::None,
        Ok("implicit") => Security::Implicit,
        _ => Security::StartTls,
    };
    let credentials = match (env::var("SMTP_USER"), env::var("SMTP_PASSWORD")) {
        (Ok(username), Ok(password)) => Credentials::Plain { username, password },
        _ => Credentials::None,
    };

    let mut builder = Config::builder(var("SMTP_HOST")?)
        .security(security)
        .credentials(credentials);
    if let Ok(port) = env::var("SMTP_PORT") {
        builder = builder.port(port.parse()?);
    }

    let email = Email::new()
        .from(Recipient::parse(&var("MAIL_FROM")?)?)
        .to(Recipient::parse(&var("MAIL_TO")?)?)
        .subject("Hello from missive")
        .plain_body("This message was sent by the missive example.")
        .html_body("<p>This message was sent by the <b>missive</b> example.</p>");

    Mailer::new(builder.build())
        .with_client_identification(concat!("missive/", env!("CARGO_PKG_VERSION")))
        .send(&email)
        .await?;

    tracing::info!("Sent");
    Ok(())
}
