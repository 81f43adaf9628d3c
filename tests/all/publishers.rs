use crate::helpers::{get_pool, FakeBroker};
use carrot_pool::pool::PoolError;
use carrot_pool::publishers::{MessageEnvelope, Publisher, PublisherError};
use carrot_pool::topology::{TopologyDescriptor, TopologyManager};
use fake::{Fake, Faker};

#[tokio::test]
async fn messages_are_published_as_text_by_default() {
    // Arrange
    let broker = FakeBroker::new();
    let pool = get_pool(&broker, 2, 1);
    TopologyManager::new(pool.clone())
        .declare_queue("send_sms")
        .await
        .unwrap();
    let payload: String = Faker.fake();

    // Act
    Publisher::new(pool.clone())
        .publish_bytes("", "send_sms", payload.as_bytes())
        .await
        .unwrap();

    // Assert
    let messages = broker.messages("send_sms");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].data, payload.as_bytes());
    assert_eq!(
        messages[0]
            .properties
            .content_type()
            .as_ref()
            .map(|c| c.as_str()),
        Some("text/plain")
    );
    assert!(messages[0].properties.message_id().is_some());
}

#[tokio::test]
async fn the_envelope_content_type_wins_over_the_default() {
    let broker = FakeBroker::new();
    let pool = get_pool(&broker, 1, 1);
    TopologyManager::new(pool.clone())
        .declare_queue("send_sms")
        .await
        .unwrap();

    Publisher::new(pool)
        .publish(
            MessageEnvelope::new("", "send_sms", r#"{"code":"1234"}"#)
                .with_content_type("application/json".into()),
        )
        .await
        .unwrap();

    let messages = broker.messages("send_sms");
    assert_eq!(
        messages[0]
            .properties
            .content_type()
            .as_ref()
            .map(|c| c.as_str()),
        Some("application/json")
    );
}

#[tokio::test]
async fn messages_follow_the_declared_bindings() {
    let broker = FakeBroker::new();
    let pool = get_pool(&broker, 1, 1);
    TopologyManager::new(pool.clone())
        .declare_all(&[
            TopologyDescriptor::binding("user", "send_email", "public"),
            TopologyDescriptor::binding("user", "send_sms", "private"),
        ])
        .await
        .unwrap();
    let publisher = Publisher::new(pool);

    publisher
        .publish_bytes("user", "public", b"welcome")
        .await
        .unwrap();
    publisher
        .publish_bytes("user", "nobody", b"lost")
        .await
        .unwrap();

    assert_eq!(broker.messages("send_email").len(), 1);
    assert!(broker.messages("send_sms").is_empty());
}

#[tokio::test]
async fn the_connection_goes_back_to_the_pool_after_publishing() {
    let broker = FakeBroker::new();
    let pool = get_pool(&broker, 1, 1);
    let publisher = Publisher::new(pool.clone());

    for _ in 0..5 {
        publisher
            .publish_bytes("", "send_sms", b"dropped, no such queue")
            .await
            .unwrap();
    }

    assert_eq!(broker.dialed(), 1);
    assert_eq!(broker.open_channels(), 0);
    assert_eq!(pool.status().idle, 1);
}

#[tokio::test]
async fn an_exhausted_pool_is_reported_as_is() {
    let broker = FakeBroker::new();
    let pool = get_pool(&broker, 1, 1);
    let _held = pool.get().await.unwrap();

    let outcome = Publisher::new(pool).publish_bytes("", "send_sms", b"").await;

    let error = match outcome {
        Err(error) => error,
        Ok(()) => panic!("Publishing should have failed"),
    };
    assert!(matches!(
        &error,
        PublisherError::Pool(PoolError::Exhausted { max_open: 1 })
    ));
    assert_eq!(error.to_string(), "All 1 connections are in use");
}

#[tokio::test]
async fn connection_failures_are_reported_as_is() {
    let broker = FakeBroker::new();
    broker.refuse_dials(true);
    let pool = get_pool(&broker, 1, 1);

    let outcome = Publisher::new(pool.clone())
        .publish_bytes("", "send_sms", b"")
        .await;

    assert!(matches!(
        outcome,
        Err(PublisherError::Pool(PoolError::Connect(_)))
    ));
    assert_eq!(pool.status().live, 0);
}

#[tokio::test]
async fn publishing_to_an_unknown_exchange_fails() {
    let broker = FakeBroker::new();
    let pool = get_pool(&broker, 1, 1);

    let outcome = Publisher::new(pool.clone())
        .publish_bytes("billing", "monthly", b"")
        .await;

    match outcome {
        Err(PublisherError::Publish {
            exchange,
            routing_key,
            ..
        }) => {
            assert_eq!(exchange, "billing");
            assert_eq!(routing_key, "monthly");
        }
        other => panic!("Expected a publish error, got {:?}", other),
    }
    assert_eq!(broker.open_channels(), 0);
    assert_eq!(pool.status().idle, 1);
}
