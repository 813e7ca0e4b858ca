//! 订单消息校验
//!
//! 在 validator 派生规则的基础上汇总整棵订单树的字段错误，
//! 一次返回全部违规项（字段路径 + 规则），而不是遇到第一个错误就停止。

use std::fmt;

use serde::Serialize;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::dto::OrderDto;

/// 单个字段违规
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    /// 字段路径，如 `delivery.email`、`items[0].sale`
    pub field: String,
    /// 违反的规则：required / length / email / range
    pub rule: String,
    pub message: Option<String>,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.rule)
    }
}

/// 一条订单消息的全部违规项
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub violations: Vec<FieldViolation>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// 是否包含指定字段的违规
    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.violations.iter().map(|v| v.field.as_str())
    }

    fn absorb(&mut self, prefix: &str, result: Result<(), ValidationErrors>) {
        let Err(errors) = result else {
            return;
        };

        let mut collected = Vec::new();
        for (field, kind) in errors.errors() {
            // 各层结构体单独校验，这里只会出现字段级错误
            if let ValidationErrorsKind::Field(errs) = kind {
                for err in errs {
                    collected.push(FieldViolation {
                        field: join_path(prefix, field.as_ref()),
                        rule: err.code.to_string(),
                        message: err.message.as_ref().map(|m| m.to_string()),
                    });
                }
            }
        }

        // HashMap 遍历顺序不稳定，排序后输出便于日志比对
        collected.sort_by(|a, b| a.field.cmp(&b.field).then_with(|| a.rule.cmp(&b.rule)));
        self.violations.extend(collected);
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.violations.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join(", "))
    }
}

impl std::error::Error for ValidationReport {}

/// 校验结果
pub type ValidationOutcome = Result<(), ValidationReport>;

/// 校验整张订单：顶层字段、收货信息、支付信息和每个商品
pub fn validate(order: &OrderDto) -> ValidationOutcome {
    let mut report = ValidationReport::default();

    report.absorb("", order.validate());
    report.absorb("delivery", order.delivery.validate());
    report.absorb("payment", order.payment.validate());
    for (idx, item) in order.items().iter().enumerate() {
        report.absorb(&format!("items[{idx}]"), item.validate());
    }

    if report.is_empty() {
        Ok(())
    } else {
        Err(report)
    }
}

fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::ItemDto;
    use crate::test_utils::sample_order;

    fn valid_order() -> OrderDto {
        sample_order("b563feb7b2b84b6test")
    }

    #[test]
    fn test_valid_order_passes() {
        assert!(validate(&valid_order()).is_ok());
    }

    #[test]
    fn test_missing_email_rejected() {
        let mut order = valid_order();
        order.delivery.email.clear();

        let report = validate(&order).unwrap_err();
        assert!(report.has_field("delivery.email"));
    }

    #[test]
    fn test_malformed_email_rejected() {
        let mut order = valid_order();
        order.delivery.email = "not-an-email".to_string();

        let report = validate(&order).unwrap_err();
        assert_eq!(report.len(), 1);
        assert_eq!(report.violations[0].field, "delivery.email");
        assert_eq!(report.violations[0].rule, "email");
    }

    #[test]
    fn test_sale_out_of_range_rejected() {
        let mut order = valid_order();
        order.items.as_mut().unwrap()[0].sale = 150;

        let report = validate(&order).unwrap_err();
        assert!(report.has_field("items[0].sale"));
        assert_eq!(report.violations[0].rule, "range");
    }

    #[test]
    fn test_missing_items_rejected() {
        let mut order = valid_order();
        order.items = None;

        let report = validate(&order).unwrap_err();
        assert_eq!(report.len(), 1);
        assert_eq!(report.violations[0].field, "items");
        assert_eq!(report.violations[0].rule, "required");
    }

    #[test]
    fn test_empty_items_list_accepted() {
        let mut order = valid_order();
        order.items = Some(Vec::new());
        assert!(validate(&order).is_ok());
    }

    #[test]
    fn test_zero_status_rejected() {
        let mut order = valid_order();
        order.items.as_mut().unwrap()[0].status = 0;

        let report = validate(&order).unwrap_err();
        assert_eq!(report.len(), 1);
        assert_eq!(report.violations[0].field, "items[0].status");
        assert_eq!(report.violations[0].rule, "required");
    }

    #[test]
    fn test_non_positive_ids_rejected() {
        let mut order = valid_order();
        order.sm_id = 0;
        let item = &mut order.items.as_mut().unwrap()[0];
        item.chrt_id = 0;
        item.nm_id = -1;
        item.total_price = 0;

        let report = validate(&order).unwrap_err();
        for field in ["sm_id", "items[0].chrt_id", "items[0].nm_id", "items[0].total_price"] {
            assert!(report.has_field(field), "缺少 {field}");
        }
    }

    #[test]
    fn test_negative_money_rejected() {
        let mut order = valid_order();
        order.payment.amount = -1;
        order.payment.custom_fee = -5;

        let report = validate(&order).unwrap_err();
        assert!(report.has_field("payment.amount"));
        assert!(report.has_field("payment.custom_fee"));
    }

    #[test]
    fn test_reports_every_violation() {
        let order = OrderDto {
            items: Some(vec![ItemDto::default(), ItemDto::default()]),
            ..Default::default()
        };

        let report = validate(&order).unwrap_err();
        assert!(report.has_field("order_uid"));
        assert!(report.has_field("date_created"));
        assert!(report.has_field("delivery.name"));
        assert!(report.has_field("payment.transaction"));
        assert!(report.has_field("items[0].status"));
        assert!(report.has_field("items[1].brand"));
    }

    #[test]
    fn test_optional_fields_may_be_empty() {
        let mut order = valid_order();
        order.track_number.clear();
        order.payment.request_id.clear();
        let item = &mut order.items.as_mut().unwrap()[0];
        item.track_number.clear();
        item.rid.clear();
        item.price = 0;
        item.status = -100;

        assert!(validate(&order).is_ok());
    }
}
