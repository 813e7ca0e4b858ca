//! 订单生成器
//!
//! 合法订单满足订单服务的全部校验规则。交易号沿用 order_uid，
//! 每单 1 ~ 5 个商品，金额为正，支付时间取当前时间。

use chrono::{SubsecRound, Utc};
use fake::Fake;
use fake::faker::address::en::{CityName, StateName, StreetName, ZipCode};
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::SafeEmail;
use fake::faker::lorem::en::Word;
use fake::faker::name::en::Name;
use order_service::dto::{DeliveryDto, ItemDto, OrderDto, PaymentDto};
use rand::Rng;
use rand::seq::SliceRandom;
use uuid::Uuid;

const CURRENCIES: [&str; 3] = ["RUB", "USD", "EUR"];
const BANKS: [&str; 4] = ["alpha", "sber", "tinkoff", "vtb"];
const DELIVERY_SERVICES: [&str; 3] = ["meest", "cdek", "boxberry"];
const LOCALES: [&str; 2] = ["en", "ru"];
const ITEM_STATUSES: [i32; 3] = [200, 201, 202];

/// 非法订单的构造方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Defect {
    /// 收货邮箱格式错误
    BadEmail,
    /// 折扣超过 100
    SaleOutOfRange,
    /// 缺少 items 字段
    NoItems,
}

impl Defect {
    pub const ALL: [Defect; 3] = [Defect::BadEmail, Defect::SaleOutOfRange, Defect::NoItems];

    /// 校验报告中应出现的字段
    pub fn field(&self) -> &'static str {
        match self {
            Self::BadEmail => "delivery.email",
            Self::SaleOutOfRange => "items[0].sale",
            Self::NoItems => "items",
        }
    }

    fn apply(&self, order: &mut OrderDto) {
        match self {
            Self::BadEmail => order.delivery.email = "not-an-email".to_string(),
            Self::SaleOutOfRange => {
                if let Some(item) = order.items.as_mut().and_then(|items| items.first_mut()) {
                    item.sale = 150;
                }
            }
            Self::NoItems => order.items = None,
        }
    }
}

/// 一条生成的订单及其预期结果
#[derive(Debug, Clone)]
pub struct GeneratedOrder {
    pub order: OrderDto,
    pub defect: Option<Defect>,
}

impl GeneratedOrder {
    pub fn is_valid(&self) -> bool {
        self.defect.is_none()
    }
}

/// 订单生成器
#[derive(Debug, Clone)]
pub struct OrderGenerator {
    invalid_ratio: f64,
}

impl OrderGenerator {
    /// `invalid_ratio` 超出 [0, 1] 时截断
    pub fn new(invalid_ratio: f64) -> Self {
        Self {
            invalid_ratio: invalid_ratio.clamp(0.0, 1.0),
        }
    }

    /// 按配置比例生成合法或非法订单
    pub fn next_order(&self) -> GeneratedOrder {
        let mut rng = rand::thread_rng();
        let mut order = valid_order();

        let defect = if rng.gen_bool(self.invalid_ratio) {
            Defect::ALL.choose(&mut rng).copied()
        } else {
            None
        };
        if let Some(defect) = defect {
            defect.apply(&mut order);
        }

        GeneratedOrder { order, defect }
    }

    pub fn batch(&self, count: usize) -> Vec<GeneratedOrder> {
        (0..count).map(|_| self.next_order()).collect()
    }
}

/// 生成一张完全合法的订单
pub fn valid_order() -> OrderDto {
    let mut rng = rand::thread_rng();

    let order_uid = Uuid::new_v4().simple().to_string();
    let track_number = format!("WBILM{}TRACK", random_upper(&mut rng, 5));

    let item_count = rng.gen_range(1..=5);
    let items: Vec<ItemDto> = (0..item_count).map(|_| random_item(&mut rng, &track_number)).collect();

    let goods_total: i64 = items.iter().map(|item| item.total_price).sum();
    let delivery_cost = rng.gen_range(0..=2_000);
    let now = Utc::now().trunc_subsecs(0);

    OrderDto {
        order_uid: order_uid.clone(),
        track_number,
        entry: "WBIL".to_string(),
        delivery: DeliveryDto {
            name: Name().fake(),
            phone: format!("+972{}", rng.gen_range(1_000_000..10_000_000)),
            zip: ZipCode().fake(),
            city: CityName().fake(),
            address: format!("{} {}", StreetName().fake::<String>(), rng.gen_range(1..=200)),
            region: StateName().fake(),
            email: SafeEmail().fake(),
        },
        payment: PaymentDto {
            transaction: order_uid,
            request_id: String::new(),
            currency: pick(&mut rng, &CURRENCIES),
            provider: "wbpay".to_string(),
            amount: goods_total + delivery_cost,
            payment_dt: now.timestamp(),
            bank: pick(&mut rng, &BANKS),
            delivery_cost,
            goods_total,
            custom_fee: 0,
        },
        items: Some(items),
        locale: pick(&mut rng, &LOCALES),
        internal_signature: random_upper(&mut rng, 10),
        customer_id: format!("customer-{}", rng.gen_range(1..100_000)),
        delivery_service: pick(&mut rng, &DELIVERY_SERVICES),
        shardkey: rng.gen_range(0..10).to_string(),
        sm_id: rng.gen_range(1..10_000),
        date_created: Some(now),
        oof_shard: rng.gen_range(0..10).to_string(),
    }
}

fn random_item(rng: &mut impl Rng, track_number: &str) -> ItemDto {
    let price: i64 = rng.gen_range(100..=5_000);
    let sale: i16 = rng.gen_range(0..=50);
    let total_price = (price * i64::from(100 - sale) / 100).max(1);

    ItemDto {
        chrt_id: rng.gen_range(1_000_000..10_000_000),
        track_number: track_number.to_string(),
        price,
        rid: format!("{}test", Uuid::new_v4().simple()),
        name: Word().fake::<String>(),
        sale,
        size: rng.gen_range(0..=60).to_string(),
        total_price,
        nm_id: rng.gen_range(1_000_000..10_000_000),
        brand: CompanyName().fake(),
        status: ITEM_STATUSES[rng.gen_range(0..ITEM_STATUSES.len())],
    }
}

fn pick(rng: &mut impl Rng, values: &[&str]) -> String {
    values[rng.gen_range(0..values.len())].to_string()
}

fn random_upper(rng: &mut impl Rng, len: usize) -> String {
    (0..len).map(|_| rng.gen_range(b'A'..=b'Z') as char).collect()
}
