//! Callback-data vocabulary for inline keyboard buttons.
//!
//! Tokens are plain strings so keyboards already sent to users keep working
//! across deployments; never rename one.

use std::fmt;

use chrono::NaiveDate;

use krash_order_core::OrderId;
use krash_order_core::delivery::{date_key, parse_date_key};

const DELIVERY_DATE_PREFIX: &str = "delivery_date_";
const DELIVERY_TIME_PREFIX: &str = "delivery_time_";
const CANCEL_ORDER_PREFIX: &str = "cancel_order_";

/// A parsed button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    PrevItem,
    NextItem,
    Increase,
    Decrease,
    RemoveItem,
    SelectDeliveryDate,
    DeliveryDate(NaiveDate),
    /// Raw interval label; validated when the order is committed.
    DeliveryTime(String),
    CancelLastOrder,
    CancelOrder(OrderId),
    BackToCart,
    BackToDates,
    BackToMenu,
    Catalog,
    About,
    MyOrders,
}

impl CallbackAction {
    /// Parse callback data. Unknown or malformed tokens yield `None`.
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        let action = match data {
            "prev_item" => Self::PrevItem,
            "next_item" => Self::NextItem,
            "increase" => Self::Increase,
            "decrease" => Self::Decrease,
            "remove_item" => Self::RemoveItem,
            "select_delivery_date" => Self::SelectDeliveryDate,
            "cancel_last_order" => Self::CancelLastOrder,
            "back_to_cart" => Self::BackToCart,
            "back_to_dates" => Self::BackToDates,
            "back_to_menu" => Self::BackToMenu,
            "catalog" => Self::Catalog,
            "about" => Self::About,
            "my_orders" => Self::MyOrders,
            other => {
                if let Some(key) = other.strip_prefix(DELIVERY_DATE_PREFIX) {
                    Self::DeliveryDate(parse_date_key(key).ok()?)
                } else if let Some(label) = other.strip_prefix(DELIVERY_TIME_PREFIX) {
                    Self::DeliveryTime(label.to_string())
                } else if let Some(id) = other.strip_prefix(CANCEL_ORDER_PREFIX) {
                    Self::CancelOrder(id.parse().ok()?)
                } else {
                    return None;
                }
            }
        };
        Some(action)
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrevItem => f.write_str("prev_item"),
            Self::NextItem => f.write_str("next_item"),
            Self::Increase => f.write_str("increase"),
            Self::Decrease => f.write_str("decrease"),
            Self::RemoveItem => f.write_str("remove_item"),
            Self::SelectDeliveryDate => f.write_str("select_delivery_date"),
            Self::DeliveryDate(date) => write!(f, "{DELIVERY_DATE_PREFIX}{}", date_key(*date)),
            Self::DeliveryTime(label) => write!(f, "{DELIVERY_TIME_PREFIX}{label}"),
            Self::CancelLastOrder => f.write_str("cancel_last_order"),
            Self::CancelOrder(id) => write!(f, "{CANCEL_ORDER_PREFIX}{id}"),
            Self::BackToCart => f.write_str("back_to_cart"),
            Self::BackToDates => f.write_str("back_to_dates"),
            Self::BackToMenu => f.write_str("back_to_menu"),
            Self::Catalog => f.write_str("catalog"),
            Self::About => f.write_str("about"),
            Self::MyOrders => f.write_str("my_orders"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fixed_tokens() {
        assert_eq!(CallbackAction::parse("prev_item"), Some(CallbackAction::PrevItem));
        assert_eq!(CallbackAction::parse("my_orders"), Some(CallbackAction::MyOrders));
        assert_eq!(CallbackAction::parse("increase"), Some(CallbackAction::Increase));
    }

    #[test]
    fn test_parse_delivery_date() {
        assert_eq!(
            CallbackAction::parse("delivery_date_2025-03-10"),
            Some(CallbackAction::DeliveryDate(
                NaiveDate::from_ymd_opt(2025, 3, 10).expect("valid")
            ))
        );
        assert_eq!(CallbackAction::parse("delivery_date_10.03"), None);
    }

    #[test]
    fn test_parse_delivery_time_keeps_label() {
        assert_eq!(
            CallbackAction::parse("delivery_time_9:00 - 11:00"),
            Some(CallbackAction::DeliveryTime("9:00 - 11:00".to_string()))
        );
    }

    #[test]
    fn test_parse_cancel_order() {
        assert_eq!(
            CallbackAction::parse("cancel_order_17"),
            Some(CallbackAction::CancelOrder(OrderId::new(17)))
        );
        assert_eq!(CallbackAction::parse("cancel_order_x"), None);
    }

    #[test]
    fn test_unknown_token() {
        assert_eq!(CallbackAction::parse("approve_everything"), None);
        assert_eq!(CallbackAction::parse(""), None);
    }

    #[test]
    fn test_display_matches_wire_tokens() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).expect("valid");
        assert_eq!(
            CallbackAction::DeliveryDate(date).to_string(),
            "delivery_date_2025-03-10"
        );
        assert_eq!(
            CallbackAction::CancelOrder(OrderId::new(3)).to_string(),
            "cancel_order_3"
        );
        for token in ["remove_item", "back_to_dates", "select_delivery_date", "about"] {
            let action = CallbackAction::parse(token).expect("known");
            assert_eq!(action.to_string(), token);
        }
    }
}
