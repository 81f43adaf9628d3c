use carrot_pool::amqp::configuration::Settings;
use carrot_pool::publishers::MessageEnvelope;
use carrot_pool::topology::TopologyDescriptor;
use carrot_pool::Messaging;
use fake::faker::internet::en::SafeEmail;
use fake::Fake;
use tracing_subscriber::EnvFilter;

/// The only behaviour our email service knows about: a registration code.
const EMAIL_REGISTER_CODE: u8 = 1;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // We are using the out-of-the-box parameters for the default RabbitMq Docker image.
    // An application would rather call `Settings::load` and keep its topology in
    // `configuration/base.yml`.
    let settings = Settings {
        topology: vec![TopologyDescriptor::binding("user", "send_email", "public")],
        ..Settings::default()
    };

    // Connections are dialed lazily: the first one is opened to declare the topology,
    // then kept idle for the publisher.
    let messaging = Messaging::start(&settings).await?;

    let email: String = SafeEmail().fake();
    let code: u32 = (100_000..999_999).fake();
    let payload = serde_json::json!({
        "behavior": EMAIL_REGISTER_CODE,
        "language": "EN",
        "email": email,
        "data": code.to_string(),
    });

    messaging
        .publisher()
        .publish(
            MessageEnvelope::new("user", "public", serde_json::to_vec(&payload)?)
                .with_content_type("application/json".into()),
        )
        .await?;
    tracing::info!(%email, "Registration code sent");

    // Idle connections are closed, anything else is closed as soon as it is handed back.
    messaging.shutdown().await;
    Ok(())
}
