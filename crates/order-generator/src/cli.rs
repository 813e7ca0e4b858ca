//! CLI 命令定义

use clap::{Parser, Subcommand};

/// 订单生成器命令行工具
#[derive(Parser, Debug)]
#[command(name = "order-generator")]
#[command(version, about = "订单消息生成工具")]
#[command(propagate_version = true)]
pub struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Kafka brokers 地址
    #[arg(long, default_value = "localhost:9092")]
    pub kafka_brokers: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 生成订单并发送到 Kafka
    Send {
        /// 发送数量
        #[arg(short, long, default_value = "10")]
        count: usize,

        /// 两条消息之间的间隔（毫秒）
        #[arg(short, long, default_value = "1000")]
        interval_ms: u64,

        /// 非法订单比例，取值 0.0 ~ 1.0
        #[arg(long, default_value = "0.0", value_parser = parse_ratio)]
        invalid_ratio: f64,

        /// 目标 topic
        #[arg(short, long, default_value = "orders")]
        topic: String,
    },

    /// 生成订单并以 JSON 输出到标准输出
    Dump {
        #[arg(short, long, default_value = "1")]
        count: usize,
    },
}

fn parse_ratio(value: &str) -> Result<f64, String> {
    let ratio: f64 = value.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&ratio) {
        Ok(ratio)
    } else {
        Err(format!("比例必须在 0.0 到 1.0 之间: {ratio}"))
    }
}
