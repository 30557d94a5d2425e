use ethers::types::Address;
use prometheus::{CounterVec, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::HashMap;

#[derive(Clone)]
pub struct MetricsCollector {
    registry: Registry,
    native_transfers_total: CounterVec,
    swaps_total: CounterVec,
    swap_cycles_total: CounterVec,
    token_balance: GaugeVec,
}

impl MetricsCollector {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let native_transfers_total = CounterVec::new(
            Opts::new("native_transfers_total", "One-time native transfers by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(native_transfers_total.clone()))?;

        let swaps_total = CounterVec::new(
            Opts::new("swaps_total", "Swap attempts by direction and outcome"),
            &["direction", "outcome"],
        )?;
        registry.register(Box::new(swaps_total.clone()))?;

        let swap_cycles_total = CounterVec::new(
            Opts::new("swap_cycles_total", "Swap passes over all wallets by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(swap_cycles_total.clone()))?;

        // Last observed balance per wallet and token, in human units
        let token_balance = GaugeVec::new(
            Opts::new("token_balance", "Last observed token balance"),
            &["wallet", "token"],
        )?;
        registry.register(Box::new(token_balance.clone()))?;

        Ok(Self {
            registry,
            native_transfers_total,
            swaps_total,
            swap_cycles_total,
            token_balance,
        })
    }

    pub fn record_transfer(&self, outcome: &str) {
        self.native_transfers_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_swap(&self, direction: &str, outcome: &str) {
        self.swaps_total.with_label_values(&[direction, outcome]).inc();
    }

    pub fn record_cycle(&self, outcome: &str) {
        self.swap_cycles_total.with_label_values(&[outcome]).inc();
    }

    pub fn set_token_balance(&self, wallet: Address, token: &str, amount: f64) {
        let wallet = format!("{wallet:?}");
        self.token_balance
            .with_label_values(&[wallet.as_str(), token])
            .set(amount);
    }

    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode_to_string(&metric_families).unwrap_or_default()
    }

    /// Flattened `name{labels} -> value` view of every sample.
    pub fn snapshot(&self) -> HashMap<String, f64> {
        let mut metrics = HashMap::new();

        for line in self.export().lines() {
            if line.starts_with('#') {
                continue;
            }
            let mut parts = line.rsplitn(2, ' ');
            if let (Some(value), Some(name)) = (parts.next(), parts.next()) {
                if let Ok(value) = value.parse::<f64>() {
                    metrics.insert(name.to_string(), value);
                }
            }
        }

        metrics
    }

    pub fn counter(&self, name: &str) -> f64 {
        self.snapshot().get(name).copied().unwrap_or(0.0)
    }
}
