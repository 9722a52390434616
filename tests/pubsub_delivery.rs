#[path = "common.rs"]
mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use topicbus::{Message, SubscriberId};

use common::{test_broker, RECV_TIMEOUT};

fn forward(tx: flume::Sender<Value>) -> impl Fn(&Value) -> anyhow::Result<()> + Send + Sync {
    move |data| {
        tx.send(data.clone())
            .map_err(|_| anyhow::anyhow!("test receiver dropped"))?;
        Ok(())
    }
}

fn assert_silent(rx: &flume::Receiver<Value>) {
    assert!(
        rx.recv_timeout(Duration::from_millis(100)).is_err(),
        "unexpected delivery"
    );
}

#[test]
fn orders_subscriber_sees_orders_but_not_users() {
    let broker = test_broker();
    let (tx, rx) = flume::unbounded();
    broker.subscribe("orders.*", "S1", forward(tx)).unwrap();

    broker.publish(Message::new("orders.created", json!({ "id": 1 })));
    assert_eq!(rx.recv_timeout(RECV_TIMEOUT).unwrap(), json!({ "id": 1 }));
    assert_silent(&rx);

    broker.publish(Message::new("users.created", json!({ "id": 2 })));
    assert_silent(&rx);

    broker.stop();
}

#[test]
fn each_publish_is_delivered_exactly_once() {
    let broker = test_broker();
    let (tx, rx) = flume::unbounded();
    broker.subscribe("metrics.cpu", "collector", forward(tx)).unwrap();

    for i in 0..5 {
        broker.publish(Message::new("metrics.cpu", json!(i)));
    }

    let received: Vec<Value> = (0..5)
        .map(|_| rx.recv_timeout(RECV_TIMEOUT).unwrap())
        .collect();
    assert_eq!(received, (0..5).map(|i| json!(i)).collect::<Vec<_>>());
    assert_silent(&rx);

    // Stopping joins the worker, so the counters are settled afterwards.
    broker.stop();
    let stats = broker.stats();
    assert_eq!(stats.published, 5);
    assert_eq!(stats.dispatched, 5);
}

#[test]
fn invalid_messages_never_reach_subscribers() {
    let broker = test_broker();
    let (tx, rx) = flume::unbounded();
    broker.subscribe("*", "catch-all", forward(tx)).unwrap();

    broker.publish(Message::new("", json!("no topic")));
    broker.publish(Message::new("a.b", Value::Null));
    assert!(broker.try_publish(Message::new("a.b", Value::Null)).is_err());

    // A non-string topic cannot even be turned into a Message.
    assert!(serde_json::from_value::<Message>(json!({ "topic": 7, "data": 1 })).is_err());

    broker.publish(Message::new("sentinel", json!("ok")));
    assert_eq!(rx.recv_timeout(RECV_TIMEOUT).unwrap(), json!("ok"));
    assert_silent(&rx);

    assert_eq!(broker.stats().rejected, 3);
    broker.stop();
}

#[test]
fn whitespace_topic_is_delivered_like_any_other() {
    let broker = test_broker();
    let (tx, rx) = flume::unbounded();
    broker.subscribe(" ", "blank", forward(tx)).unwrap();

    broker.try_publish(Message::new(" ", json!(1))).unwrap();
    assert_eq!(rx.recv_timeout(RECV_TIMEOUT).unwrap(), json!(1));
    broker.stop();
}

#[test]
fn wildcard_patterns_are_start_anchored() {
    let broker = test_broker();
    let (wild_tx, wild_rx) = flume::unbounded();
    let (exact_tx, exact_rx) = flume::unbounded();
    broker.subscribe("a.*", "wild", forward(wild_tx)).unwrap();
    broker.subscribe("a.b", "exact", forward(exact_tx)).unwrap();

    for topic in ["a.b", "a.bc", "x.a.b"] {
        broker.publish(Message::new(topic, json!(topic)));
    }

    assert_eq!(wild_rx.recv_timeout(RECV_TIMEOUT).unwrap(), json!("a.b"));
    assert_eq!(wild_rx.recv_timeout(RECV_TIMEOUT).unwrap(), json!("a.bc"));
    assert_silent(&wild_rx);

    assert_eq!(exact_rx.recv_timeout(RECV_TIMEOUT).unwrap(), json!("a.b"));
    assert_silent(&exact_rx);

    broker.stop();
}

#[test]
fn unsubscribing_one_subscriber_leaves_the_other() {
    let broker = test_broker();
    let (tx1, rx1) = flume::unbounded();
    let (tx2, rx2) = flume::unbounded();
    broker.subscribe("jobs.*", "w1", forward(tx1)).unwrap();
    broker.subscribe("jobs.*", "w2", forward(tx2)).unwrap();

    broker.publish(Message::new("jobs.start", json!(1)));
    assert_eq!(rx1.recv_timeout(RECV_TIMEOUT).unwrap(), json!(1));
    assert_eq!(rx2.recv_timeout(RECV_TIMEOUT).unwrap(), json!(1));

    assert!(broker.unsubscribe("jobs.*", "w1"));
    assert!(!broker.unsubscribe("jobs.*", "w1"));

    broker.publish(Message::new("jobs.stop", json!(2)));
    assert_eq!(rx2.recv_timeout(RECV_TIMEOUT).unwrap(), json!(2));
    assert_silent(&rx1);

    broker.stop();
}

#[test]
fn resubscribing_replaces_the_callback() {
    let broker = test_broker();
    let (old_tx, old_rx) = flume::unbounded();
    let (new_tx, new_rx) = flume::unbounded();

    broker.subscribe("cfg.*", "watcher", forward(old_tx)).unwrap();
    broker.subscribe("cfg.*", SubscriberId::from("watcher"), forward(new_tx)).unwrap();
    assert_eq!(broker.subscription_count(), 1);

    broker.publish(Message::new("cfg.reload", json!(true)));
    assert_eq!(new_rx.recv_timeout(RECV_TIMEOUT).unwrap(), json!(true));
    assert_silent(&old_rx);

    broker.stop();
}

#[test]
fn failing_subscriber_does_not_affect_others() {
    let broker = test_broker();
    let (tx, rx) = flume::unbounded();

    broker
        .subscribe("events.*", "flaky", |_| anyhow::bail!("flaky subscriber"))
        .unwrap();
    broker
        .subscribe("events.*", "crashy", |_| -> anyhow::Result<()> {
            panic!("crashy subscriber")
        })
        .unwrap();
    broker.subscribe("events.*", "steady", forward(tx)).unwrap();

    broker.publish(Message::new("events.one", json!(1)));
    broker.publish(Message::new("events.two", json!(2)));

    assert_eq!(rx.recv_timeout(RECV_TIMEOUT).unwrap(), json!(1));
    assert_eq!(rx.recv_timeout(RECV_TIMEOUT).unwrap(), json!(2));
    assert!(broker.is_worker_alive());

    broker.stop();
    assert_eq!(broker.stats().callback_failures, 4);
}

#[test]
fn callbacks_may_subscribe_and_publish() {
    let broker = Arc::new(test_broker());
    let (tx, rx) = flume::unbounded();

    let weak = Arc::downgrade(&broker);
    let sink = tx.clone();
    broker
        .subscribe("setup", "bootstrap", move |data| {
            let Some(broker) = weak.upgrade() else {
                return Ok(());
            };
            broker.subscribe("late.*", "late", forward(sink.clone()))?;
            broker.try_publish(Message::new("late.hello", data.clone()))?;
            Ok(())
        })
        .unwrap();

    broker.publish(Message::new("setup", json!("hi")));
    assert_eq!(rx.recv_timeout(RECV_TIMEOUT).unwrap(), json!("hi"));

    broker.stop();
}

#[test]
fn stopped_broker_has_no_worker_and_next_broker_starts_empty() {
    let broker = test_broker();
    broker.subscribe("a.*", "s1", |_| Ok(())).unwrap();
    broker.stop();
    assert!(!broker.is_worker_alive());
    assert!(broker.patterns().is_empty());

    let fresh = test_broker();
    assert_eq!(fresh.subscription_count(), 0);
    assert_ne!(fresh.id(), broker.id());
    fresh.stop();
}
