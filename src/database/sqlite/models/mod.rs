
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MenuItem {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub image_url: Option<String>,
    pub available: bool,
    pub created_at: NaiveDateTime,
}

impl MenuItem {
    #[inline]
    pub fn category_label(&self) -> String {
        display_label(&self.category)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMenuItem {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub image_url: Option<String>,
    pub available: bool,
}

/// An order joined with its customer's username
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub order_ref: String,
    pub customer: String,
    pub status: String,
    pub total_amount: f64,
    pub delivery_fee: f64,
    pub delivery_address: String,
    pub delivery_phone: String,
    pub created_at: NaiveDateTime,
}

impl Order {
    #[inline]
    pub fn grand_total(&self) -> f64 {
        self.total_amount + self.delivery_fee
    }

    #[inline]
    pub fn status_label(&self) -> String {
        display_label(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_ref: String,
    pub user_id: i64,
    pub status: String,
    pub total_amount: f64,
    pub delivery_fee: f64,
    pub delivery_address: String,
    pub delivery_phone: String,
}

/// One line of an order, joined with the menu item name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OrderLine {
    pub order_pk: i64,
    pub item_name: String,
    pub quantity: i64,
    pub price: f64,
}

impl OrderLine {
    #[inline]
    pub fn subtotal(&self) -> f64 {
        self.quantity as f64 * self.price
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub order_pk: i64,
    pub menu_item_id: i64,
    pub quantity: i64,
    pub price: f64,
}

/// A payment joined with the public reference of the order it settles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: i64,
    pub transaction_id: String,
    pub order_ref: String,
    pub payment_method: String,
    pub payment_status: String,
    pub amount: f64,
    pub upi_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub paid_at: Option<NaiveDateTime>,
}

impl Payment {
    #[inline]
    pub fn method_label(&self) -> String {
        display_label(&self.payment_method)
    }

    #[inline]
    pub fn status_label(&self) -> String {
        display_label(&self.payment_status)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPayment {
    pub order_pk: i64,
    pub transaction_id: String,
    pub payment_method: String,
    pub payment_status: String,
    pub amount: f64,
    pub upi_id: Option<String>,
    pub paid_at: Option<NaiveDateTime>,
}

/// Human-readable label for a stored choice value such as `out_for_delivery`
#[inline]
pub fn display_label(raw: &str) -> String {
    match raw.trim().to_lowercase().as_str() {
        "upi" => return "UPI".to_string(),
        "cod" => return "Cash on Delivery".to_string(),
        "" => return "Unknown".to_string(),
        _ => {}
    }

    raw.trim()
        .split(['_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect::<String>()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}
