//! 测试工具模块
//!
//! 提供单元测试、集成测试和基准测试共用的订单样例、内存存储和数据库配置。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use dashmap::DashMap;
use order_shared::config::DatabaseConfig;
use uuid::Uuid;

use crate::dto::{DeliveryDto, ItemDto, OrderDto, PaymentDto};
use crate::error::{OrderError, Result};
use crate::models::{Item, OrderInfo};
use crate::repository::OrderStorage;

// ==================== 测试数据 ====================

/// 构造一张完全合法的订单，交易号与 order_uid 相同
pub fn sample_order(order_uid: &str) -> OrderDto {
    OrderDto {
        order_uid: order_uid.to_string(),
        track_number: "WBILMTESTTRACK".to_string(),
        entry: "WBIL".to_string(),
        delivery: DeliveryDto {
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "a@b.com".to_string(),
        },
        payment: PaymentDto {
            transaction: order_uid.to_string(),
            request_id: String::new(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: 1817,
            payment_dt: 1_637_907_727,
            bank: "alpha".to_string(),
            delivery_cost: 1500,
            goods_total: 317,
            custom_fee: 0,
        },
        items: Some(vec![sample_item(9_934_930)]),
        locale: "en".to_string(),
        internal_signature: String::from("sig"),
        customer_id: "test".to_string(),
        delivery_service: "meest".to_string(),
        shardkey: "9".to_string(),
        sm_id: 99,
        date_created: Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19).single(),
        oof_shard: "1".to_string(),
    }
}

pub fn sample_item(chrt_id: i64) -> ItemDto {
    ItemDto {
        chrt_id,
        track_number: "WBILMTESTTRACK".to_string(),
        price: 453,
        rid: "ab4219087a764ae0btest".to_string(),
        name: "Mascaras".to_string(),
        sale: 30,
        size: "0".to_string(),
        total_price: 317,
        nm_id: 2_389_212,
        brand: "Vivienne Sabo".to_string(),
        status: 202,
    }
}

/// 生成唯一的订单号，避免并行测试之间互相覆盖
pub fn unique_order_uid() -> String {
    format!("test-{}", Uuid::new_v4().simple())
}

/// 生成唯一的 chrt_id
pub fn unique_chrt_id() -> i64 {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let base = Utc::now().timestamp_micros() % 1_000_000_000;
    base + COUNTER.fetch_add(1, Ordering::SeqCst) as i64 + 1
}

/// 测试用数据库配置，优先读取 `TEST_DATABASE_URL`，其次 `DATABASE_URL`
pub fn test_database_config() -> DatabaseConfig {
    let url = std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .unwrap_or_else(|_| DatabaseConfig::default().url);

    DatabaseConfig {
        url,
        max_connections: 5,
        min_connections: 1,
        connect_timeout_seconds: 10,
        idle_timeout_seconds: 300,
    }
}

// ==================== 内存存储 ====================

/// 基于 DashMap 的内存存储
///
/// 语义与 PostgreSQL 实现一致：订单、支付、商品按主键覆盖，
/// 订单与商品的关联只增不减，关联指向不存在的商品时返回 `MalformedStoredData`。`set_unavailable(true)` 后所有调用返回瞬时存储错误。
#[derive(Clone, Default)]
pub struct MemoryOrderStorage {
    orders: Arc<DashMap<String, OrderInfo>>,
    items: Arc<DashMap<i64, Item>>,
    links: Arc<DashMap<String, Vec<i64>>>,
    unavailable: Arc<AtomicBool>,
    loads: Arc<AtomicUsize>,
    upserts: Arc<AtomicUsize>,
}

impl MemoryOrderStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// load 被调用的次数（用于断言缓存命中时没有访问存储）
    pub fn load_calls(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn upsert_calls(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// 删除商品行但保留关联，构造损坏的存储数据
    pub fn remove_item(&self, chrt_id: i64) -> bool {
        self.items.remove(&chrt_id).is_some()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(OrderError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStorage for MemoryOrderStorage {
    async fn load(&self, order_uid: &str) -> Result<OrderInfo> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let stored = self
            .orders
            .get(order_uid)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| OrderError::not_found(order_uid))?;

        let mut chrt_ids = self
            .links
            .get(order_uid)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        chrt_ids.sort_unstable();

        let mut items = Vec::with_capacity(chrt_ids.len());
        for chrt_id in chrt_ids {
            let item = self
                .items
                .get(&chrt_id)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| {
                    OrderError::malformed(order_uid, format!("关联的商品 {chrt_id} 不存在"))
                })?;
            items.push(item);
        }

        Ok(OrderInfo {
            order: stored.order,
            payment: stored.payment,
            items,
        })
    }

    async fn upsert(&self, info: &OrderInfo) -> Result<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        for item in &info.items {
            self.items.insert(item.chrt_id, item.clone());
        }

        let mut links = self.links.entry(info.order.order_uid.clone()).or_default();
        for item in &info.items {
            if !links.contains(&item.chrt_id) {
                links.push(item.chrt_id);
            }
        }
        drop(links);

        self.orders.insert(
            info.order.order_uid.clone(),
            OrderInfo {
                order: info.order.clone(),
                payment: info.payment.clone(),
                items: Vec::new(),
            },
        );

        Ok(())
    }
}
