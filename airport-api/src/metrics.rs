use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Debug, Clone, Copy)]
pub enum OrderOutcome {
    Created,
    Rejected,
    Failed,
}

impl OrderOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            OrderOutcome::Created => "created",
            OrderOutcome::Rejected => "rejected",
            OrderOutcome::Failed => "failed",
        }
    }
}

/// Prometheus registry scoped to one application instance
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    orders: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let orders = IntCounterVec::new(
            Opts::new("airport_orders_total", "Order creation attempts by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(orders.clone()))?;
        Ok(Self { registry, orders })
    }

    pub fn record_order(&self, outcome: OrderOutcome) {
        self.orders.with_label_values(&[outcome.as_str()]).inc();
    }

    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
