//! 订单仓储的 PostgreSQL 实现
//!
//! 写入顺序：支付 -> 商品 -> 订单 -> 关联表，全部在同一事务中执行。
//! 各实体按主键 upsert，关联表重复插入被忽略。

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument};

use super::traits::OrderStorage;
use crate::error::{OrderError, Result};
use crate::models::{Item, Order, OrderInfo, Payment};

/// 订单仓储
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ==================== 查询操作 ====================

    async fn get_order(&self, order_uid: &str) -> Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT order_uid, track_number, entry, delivery, payment_id, locale,
                   internal_signature, customer_id, delivery_service, shardkey,
                   sm_id, date_created, oof_shard
            FROM orders
            WHERE order_uid = $1
            "#,
        )
        .bind(order_uid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    async fn get_payment(&self, transaction: &str) -> Result<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            SELECT transaction, request_id, currency, provider, amount, payment_dt,
                   bank, delivery_cost, goods_total, custom_fee
            FROM payments
            WHERE transaction = $1
            "#,
        )
        .bind(transaction)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// 订单关联的商品 id，按 chrt_id 升序
    async fn list_chrt_ids(&self, order_uid: &str) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT chrt_id
            FROM orders_items
            WHERE order_uid = $1
            ORDER BY chrt_id
            "#,
        )
        .bind(order_uid)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn list_items(&self, chrt_ids: &[i64]) -> Result<Vec<Item>> {
        if chrt_ids.is_empty() {
            return Ok(Vec::new());
        }

        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT chrt_id, track_number, price, rid, name, sale, size,
                   total_price, nm_id, brand, status
            FROM items
            WHERE chrt_id = ANY($1)
            ORDER BY chrt_id
            "#,
        )
        .bind(chrt_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    // ==================== 事务内写入 ====================

    async fn upsert_payment(conn: &mut PgConnection, payment: &Payment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                transaction, request_id, currency, provider, amount, payment_dt,
                bank, delivery_cost, goods_total, custom_fee
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (transaction) DO UPDATE SET
                request_id = EXCLUDED.request_id,
                currency = EXCLUDED.currency,
                provider = EXCLUDED.provider,
                amount = EXCLUDED.amount,
                payment_dt = EXCLUDED.payment_dt,
                bank = EXCLUDED.bank,
                delivery_cost = EXCLUDED.delivery_cost,
                goods_total = EXCLUDED.goods_total,
                custom_fee = EXCLUDED.custom_fee
            "#,
        )
        .bind(&payment.transaction)
        .bind(&payment.request_id)
        .bind(&payment.currency)
        .bind(&payment.provider)
        .bind(payment.amount)
        .bind(payment.payment_dt)
        .bind(&payment.bank)
        .bind(payment.delivery_cost)
        .bind(payment.goods_total)
        .bind(payment.custom_fee)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// 同一 chrt_id 被多个订单引用时，后写入的字段覆盖先写入的
    async fn upsert_items(conn: &mut PgConnection, items: &[Item]) -> Result<()> {
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO items (
                    chrt_id, track_number, price, rid, name, sale, size,
                    total_price, nm_id, brand, status
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (chrt_id) DO UPDATE SET
                    track_number = EXCLUDED.track_number,
                    price = EXCLUDED.price,
                    rid = EXCLUDED.rid,
                    name = EXCLUDED.name,
                    sale = EXCLUDED.sale,
                    size = EXCLUDED.size,
                    total_price = EXCLUDED.total_price,
                    nm_id = EXCLUDED.nm_id,
                    brand = EXCLUDED.brand,
                    status = EXCLUDED.status
                "#,
            )
            .bind(item.chrt_id)
            .bind(&item.track_number)
            .bind(item.price)
            .bind(&item.rid)
            .bind(&item.name)
            .bind(item.sale)
            .bind(&item.size)
            .bind(item.total_price)
            .bind(item.nm_id)
            .bind(&item.brand)
            .bind(item.status)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    async fn upsert_order(conn: &mut PgConnection, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                order_uid, track_number, entry, delivery, payment_id, locale,
                internal_signature, customer_id, delivery_service, shardkey,
                sm_id, date_created, oof_shard
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (order_uid) DO UPDATE SET
                track_number = EXCLUDED.track_number,
                entry = EXCLUDED.entry,
                delivery = EXCLUDED.delivery,
                payment_id = EXCLUDED.payment_id,
                locale = EXCLUDED.locale,
                internal_signature = EXCLUDED.internal_signature,
                customer_id = EXCLUDED.customer_id,
                delivery_service = EXCLUDED.delivery_service,
                shardkey = EXCLUDED.shardkey,
                sm_id = EXCLUDED.sm_id,
                date_created = EXCLUDED.date_created,
                oof_shard = EXCLUDED.oof_shard
            "#,
        )
        .bind(&order.order_uid)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(&order.delivery)
        .bind(&order.payment_id)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shardkey)
        .bind(order.sm_id)
        .bind(order.date_created)
        .bind(&order.oof_shard)
        .execute(conn)
        .await?;

        Ok(())
    }

    async fn link_items(conn: &mut PgConnection, order_uid: &str, chrt_ids: &[i64]) -> Result<()> {
        if chrt_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO orders_items (order_uid, chrt_id)
            SELECT $1, UNNEST($2::BIGINT[])
            ON CONFLICT (order_uid, chrt_id) DO NOTHING
            "#,
        )
        .bind(order_uid)
        .bind(chrt_ids)
        .execute(conn)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl OrderStorage for OrderRepository {
    #[instrument(skip(self))]
    async fn load(&self, order_uid: &str) -> Result<OrderInfo> {
        let order = self
            .get_order(order_uid)
            .await?
            .ok_or_else(|| OrderError::not_found(order_uid))?;

        let payment = self
            .get_payment(&order.payment_id)
            .await?
            .ok_or_else(|| OrderError::not_found(order_uid))?;

        let chrt_ids = self.list_chrt_ids(order_uid).await?;
        let items = self.list_items(&chrt_ids).await?;

        // 关联表指向了不存在的商品
        if items.len() != chrt_ids.len() {
            return Err(OrderError::malformed(
                order_uid,
                format!("关联商品 {} 个，实际读到 {} 个", chrt_ids.len(), items.len()),
            ));
        }

        Ok(OrderInfo {
            order,
            payment,
            items,
        })
    }

    #[instrument(skip(self, info), fields(order_uid = %info.order.order_uid, items = info.items.len()))]
    async fn upsert(&self, info: &OrderInfo) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        Self::upsert_payment(&mut *tx, &info.payment).await?;
        Self::upsert_items(&mut *tx, &info.items).await?;
        Self::upsert_order(&mut *tx, &info.order).await?;
        Self::link_items(&mut *tx, &info.order.order_uid, &info.chrt_ids()).await?;

        // 提前返回时 tx 被 drop，事务自动回滚
        tx.commit().await?;

        debug!("订单事务已提交");
        Ok(())
    }
}
