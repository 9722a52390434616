use std::sync::Once;
use std::time::Duration;

use topicbus::{Broker, BrokerConfig};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = topicbus::logging::init_logging();
    });
}

#[allow(dead_code)]
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

#[allow(dead_code)]
pub fn test_broker() -> Broker {
    init_logging();
    let mut cfg = BrokerConfig::default();
    cfg.dispatch.shutdown_timeout = Duration::from_secs(2);
    Broker::new(cfg).expect("broker should start")
}
