//! Live Transaction Feed
//!
//! Publishes generated card transactions to NATS at a fixed cadence so the
//! scoring service (and anything watching its prediction subject) has a
//! continuous feed.

use chrono::Utc;
use rand::rngs::ThreadRng;
use rand::Rng;
use risk_scoring_service::types::{DeviceInfo, MerchantInfo, Transaction};
use std::time::Duration;
use tracing::{info, warn};

/// (name, category, mcc, country)
const MERCHANTS: [(&str, &str, &str, &str); 15] = [
    ("Amazon Prime", "E-Commerce", "5999", "US"),
    ("Starbucks Coffee", "Food & Drink", "5812", "US"),
    ("Shell Gas Station", "Fuel", "5541", "GB"),
    ("Apple Store", "Electronics", "5732", "AU"),
    ("Netflix Subscription", "Streaming", "5968", "BR"),
    ("Walmart Supercenter", "Retail", "5912", "US"),
    ("British Airways", "Travel", "4511", "GB"),
    ("Binance Exchange", "Crypto", "6051", "MT"),
    ("Marriott Hotels", "Hotels", "7011", "AE"),
    ("Luxury Goods Ltd", "Jewelry", "5944", "CH"),
    ("McDonald's", "Food & Drink", "5814", "US"),
    ("Uber Technologies", "Transport", "4121", "IN"),
    ("Steam Gaming", "Entertainment", "7994", "US"),
    ("Western Union", "Wire Transfer", "4829", "NG"),
    ("Coinbase Global", "Crypto", "6051", "US"),
];

/// (display location, country)
const LOCATIONS: [(&str, &str); 12] = [
    ("New York, US", "US"),
    ("London, UK", "GB"),
    ("Mumbai, IN", "IN"),
    ("Sydney, AU", "AU"),
    ("Dubai, AE", "AE"),
    ("São Paulo, BR", "BR"),
    ("Tokyo, JP", "JP"),
    ("Singapore, SG", "SG"),
    ("Lagos, NG", "NG"),
    ("Malta, MT", "MT"),
    ("Zurich, CH", "CH"),
    ("Toronto, CA", "CA"),
];

const CURRENCIES: [&str; 7] = ["USD", "EUR", "GBP", "INR", "AED", "SGD", "AUD"];

/// Transaction generator for the live feed
struct TransactionGenerator {
    rng: ThreadRng,
    /// Small card pool so velocity windows fill up
    cards: Vec<String>,
}

impl TransactionGenerator {
    fn new(card_pool: usize) -> Self {
        let mut rng = rand::thread_rng();
        let cards = (0..card_pool.max(1))
            .map(|_| format!("card_{:08x}", rng.gen::<u32>()))
            .collect();
        Self { rng, cards }
    }

    /// 70% everyday, 25% mid-size, 5% large purchases
    fn amount(&mut self) -> f64 {
        let roll: f64 = self.rng.gen();
        let amount: f64 = if roll < 0.70 {
            self.rng.gen_range(5.0..200.0)
        } else if roll < 0.95 {
            self.rng.gen_range(200.0..2000.0)
        } else {
            self.rng.gen_range(2000.0..15000.0)
        };
        (amount * 100.0).round() / 100.0
    }

    fn generate(&mut self) -> Transaction {
        let (name, category, mcc, merchant_country) =
            MERCHANTS[self.rng.gen_range(0..MERCHANTS.len())];
        let (location, country) = LOCATIONS[self.rng.gen_range(0..LOCATIONS.len())];
        let card_id = self.cards[self.rng.gen_range(0..self.cards.len())].clone();
        let last4: u16 = self.rng.gen_range(0..10000);

        Transaction {
            masked_pan: format!("**** **** **** {:04}", last4),
            amount: self.amount(),
            currency: CURRENCIES[self.rng.gen_range(0..CURRENCIES.len())].to_string(),
            merchant: MerchantInfo {
                name: name.to_string(),
                category: category.to_string(),
                country: merchant_country.to_string(),
                mcc: mcc.to_string(),
            },
            device: DeviceInfo {
                fingerprint: format!("fp_{:04x}", self.rng.gen_range(0..64u16)),
                ip_address: format!(
                    "{}.{}.{}.{}",
                    self.rng.gen_range(1..255),
                    self.rng.gen_range(0..255),
                    self.rng.gen_range(0..255),
                    self.rng.gen_range(1..255)
                ),
                location: location.to_string(),
                country: country.to_string(),
            },
            card_id,
            timestamp: Utc::now(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    info!("Starting live transaction feed");

    // Positional: url subject count interval_ms card_pool
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("transactions");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let interval_ms: u64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(800);
    let card_pool: usize = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(20);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        interval_ms = interval_ms,
        card_pool = card_pool,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, interval_ms, card_pool).await;
        }
    };

    let mut generator = TransactionGenerator::new(card_pool);
    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));

    for i in 0..count {
        interval.tick().await;

        let transaction = generator.generate();
        let payload = serde_json::to_vec(&transaction)?;
        client.publish(subject.to_string(), payload.into()).await?;

        if (i + 1) % 10 == 0 {
            info!("Published {}/{} transactions", i + 1, count);
        }
    }

    client.flush().await?;
    info!("Completed! Published {} transactions", count);

    Ok(())
}

async fn run_dry_mode(count: u64, interval_ms: u64, card_pool: usize) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = TransactionGenerator::new(card_pool);
    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));

    for i in 0..count {
        interval.tick().await;
        let transaction = generator.generate();

        if (i + 1) % 10 == 0 || i == 0 {
            info!(
                "Sample transaction {}:\n{}",
                i + 1,
                serde_json::to_string_pretty(&transaction)?
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amounts_are_positive_cents() {
        let mut generator = TransactionGenerator::new(4);
        for _ in 0..1_000 {
            let amount = generator.amount();
            assert!((5.0..=15000.0).contains(&amount), "amount {}", amount);
            assert_eq!((amount * 100.0).round() / 100.0, amount);
        }
    }

    #[test]
    fn test_generated_transactions_validate() {
        let mut generator = TransactionGenerator::new(4);
        for _ in 0..200 {
            let tx = generator.generate();
            assert!(tx.validate().is_ok(), "{:?}", tx);
            assert!(generator.cards.contains(&tx.card_id));
        }
    }
}
