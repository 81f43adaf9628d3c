use crate::amqp::Delivery;
use std::future::Future;

/// Implementers of the `Handler` trait process the messages pulled from a queue by a
/// [`Consumer`](super::Consumer).
///
/// # Scope
///
/// `handle` does not get access to the underlying RabbitMq channel, nor does it get to
/// ack or reject the message: consumers run in auto-acknowledge mode, so a delivery is
/// settled before it reaches the handler. Whatever the handler does with the message
/// (including failing to process it) is invisible to the broker.
///
/// # Implementers
///
/// While you can implement `Handler` for a struct or enum, most of the time you will be
/// relying on our implementation of `Handler` for async closures with a matching signature -
/// `Fn(Delivery) -> impl Future<Output = ()>`.
#[async_trait::async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, delivery: Delivery);
}

#[async_trait::async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Delivery) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, delivery: Delivery) {
        // `self`, in this case, is a function, which we are calling on its argument using
        // parenthesis notation - self(_)
        (self)(delivery).await
    }
}
