//! 订单生成器入口

use std::io::Write as _;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use order_generator::cli::{Cli, Commands};
use order_generator::generator::OrderGenerator;
use order_shared::config::KafkaConfig;
use order_shared::kafka::KafkaProducer;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 优先使用环境变量 RUST_LOG，否则使用命令行参数指定的级别
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Send {
            count,
            interval_ms,
            invalid_ratio,
            topic,
        } => send(&cli.kafka_brokers, &topic, count, interval_ms, invalid_ratio).await,
        Commands::Dump { count } => dump(count),
    }
}

async fn send(brokers: &str, topic: &str, count: usize, interval_ms: u64, invalid_ratio: f64) -> Result<()> {
    let producer = KafkaProducer::new(&KafkaConfig {
        brokers: brokers.to_string(),
        ..KafkaConfig::default()
    })?;
    let generator = OrderGenerator::new(invalid_ratio);

    info!(brokers, topic, count, invalid_ratio, "开始发送订单");

    let (mut sent, mut invalid, mut failed) = (0usize, 0usize, 0usize);
    for i in 0..count {
        let generated = generator.next_order();
        let order_uid = generated.order.order_uid.clone();

        match producer.send_json(topic, &order_uid, &generated.order).await {
            Ok((partition, offset)) => {
                sent += 1;
                if !generated.is_valid() {
                    invalid += 1;
                }
                info!(
                    order_uid = %order_uid,
                    partition,
                    offset,
                    defect = ?generated.defect,
                    "订单已发送"
                );
            }
            Err(e) => {
                failed += 1;
                error!(order_uid = %order_uid, error = %e, "订单发送失败");
            }
        }

        if interval_ms > 0 && i + 1 < count {
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        }
    }

    info!(sent, invalid, failed, "发送完成");
    Ok(())
}

fn dump(count: usize) -> Result<()> {
    let generator = OrderGenerator::new(0.0);
    let orders: Vec<_> = generator.batch(count).into_iter().map(|g| g.order).collect();

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &orders)?;
    writeln!(stdout)?;
    Ok(())
}
