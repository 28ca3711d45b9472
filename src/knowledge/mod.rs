
pub mod store_info;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::Config;
use crate::database::Database;
use crate::database::models::{MenuItem, Order, OrderLine, Payment};
use crate::{ChatError, Result};

pub use store_info::{DEFAULT_STORE_INFO, MAX_SECTION_CHARS, StoreSection};

/// A retrievable unit of bakery knowledge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub source: DocumentSource,
}

/// Where a document came from. Carries enough to cite the record it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentSource {
    MenuItem {
        id: i64,
        name: String,
        category: String,
    },
    Order {
        id: i64,
        order_ref: String,
        status: String,
    },
    Payment {
        id: i64,
        transaction_id: String,
        order_ref: String,
    },
    StoreInfo {
        section: String,
    },
}

impl DocumentSource {
    #[inline]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MenuItem { .. } => "menu_item",
            Self::Order { .. } => "order",
            Self::Payment { .. } => "payment",
            Self::StoreInfo { .. } => "store_info",
        }
    }

    /// Stable reference such as `menu_item:3` or `order:ORD1001`
    #[inline]
    pub fn citation(&self) -> String {
        match self {
            Self::MenuItem { id, .. } => format!("menu_item:{id}"),
            Self::Order { order_ref, .. } => format!("order:{order_ref}"),
            Self::Payment { transaction_id, .. } => format!("payment:{transaction_id}"),
            Self::StoreInfo { section } => format!("store_info:{}", slugify(section)),
        }
    }

    /// Lowercase tags that suggestion rules match against
    #[inline]
    pub fn category_tags(&self) -> Vec<String> {
        match self {
            Self::MenuItem { category, .. } => {
                vec!["menu".to_string(), category.trim().to_lowercase()]
            }
            Self::Order { status, .. } => {
                vec!["orders".to_string(), status.trim().to_lowercase()]
            }
            Self::Payment { .. } => vec!["payments".to_string(), "orders".to_string()],
            Self::StoreInfo { section } => std::iter::once("store".to_string())
                .chain(
                    section
                        .split(|c: char| !c.is_alphanumeric())
                        .filter(|word| !word.is_empty())
                        .map(str::to_lowercase),
                )
                .collect(),
        }
    }
}

impl Document {
    #[inline]
    pub fn citation(&self) -> String {
        self.source.citation()
    }

    #[inline]
    pub fn category_tags(&self) -> Vec<String> {
        self.source.category_tags()
    }
}

/// Lowercase, hyphen-separated form of a title
#[inline]
pub fn slugify(title: &str) -> String {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Structured records the extractor turns into documents
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    async fn menu_items(&self) -> anyhow::Result<Vec<MenuItem>>;
    async fn orders(&self) -> anyhow::Result<Vec<Order>>;
    async fn order_lines(&self) -> anyhow::Result<Vec<OrderLine>>;
    async fn payments(&self) -> anyhow::Result<Vec<Payment>>;
}

#[async_trait]
impl KnowledgeSource for Database {
    async fn menu_items(&self) -> anyhow::Result<Vec<MenuItem>> {
        self.list_menu_items().await
    }

    async fn orders(&self) -> anyhow::Result<Vec<Order>> {
        self.list_orders().await
    }

    async fn order_lines(&self) -> anyhow::Result<Vec<OrderLine>> {
        self.list_order_lines().await
    }

    async fn payments(&self) -> anyhow::Result<Vec<Payment>> {
        self.list_payments().await
    }
}

/// Serializes storefront records and store information into documents
#[derive(Debug, Clone)]
pub struct KnowledgeExtractor {
    currency: String,
    store_info_path: Option<PathBuf>,
}

impl KnowledgeExtractor {
    #[inline]
    pub fn new(currency: impl Into<String>, store_info_path: Option<PathBuf>) -> Self {
        Self {
            currency: currency.into(),
            store_info_path,
        }
    }

    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.knowledge.currency_symbol.clone(),
            config.store_info_path(),
        )
    }

    /// Full scan: menu items, orders, payments, then store information sections
    #[inline]
    pub async fn extract(&self, source: &dyn KnowledgeSource) -> Result<Vec<Document>> {
        let unavailable = |e: anyhow::Error| ChatError::DatabaseUnavailable(format!("{e:#}"));

        let menu = source.menu_items().await.map_err(unavailable)?;
        let orders = source.orders().await.map_err(unavailable)?;
        let lines = source.order_lines().await.map_err(unavailable)?;
        let payments = source.payments().await.map_err(unavailable)?;
        let store_text = self.store_info_text()?;

        let mut documents = Vec::with_capacity(menu.len() + orders.len() + payments.len());
        documents.extend(menu.iter().map(|item| self.menu_document(item)));
        documents.extend(orders.iter().map(|order| {
            let order_lines: Vec<&OrderLine> = lines
                .iter()
                .filter(|line| line.order_pk == order.id)
                .collect();
            self.order_document(order, &order_lines)
        }));
        documents.extend(payments.iter().map(|payment| self.payment_document(payment)));

        let sections = store_info::split_sections(&store_text);
        debug!("Store information yielded {} sections", sections.len());
        documents.extend(sections.into_iter().map(|section| Document {
            text: section.text,
            source: DocumentSource::StoreInfo {
                section: section.title,
            },
        }));

        info!(
            "Extracted {} documents ({} menu items, {} orders, {} payments)",
            documents.len(),
            menu.len(),
            orders.len(),
            payments.len()
        );
        Ok(documents)
    }

    fn store_info_text(&self) -> Result<String> {
        match &self.store_info_path {
            Some(path) => std::fs::read_to_string(path).map_err(|e| {
                ChatError::Config(format!(
                    "Failed to read store information from {}: {e}",
                    path.display()
                ))
            }),
            None => Ok(DEFAULT_STORE_INFO.to_string()),
        }
    }

    fn money(&self, amount: f64) -> String {
        format!("{}{:.2}", self.currency, amount)
    }

    #[inline]
    pub fn menu_document(&self, item: &MenuItem) -> Document {
        let text = format!(
            "Menu Item: {}\nCategory: {}\nPrice: {}\nDescription: {}\nAvailable: {}\nCreated: {}",
            item.name,
            item.category_label(),
            self.money(item.price),
            item.description,
            if item.available { "Yes" } else { "No" },
            item.created_at.format("%Y-%m-%d"),
        );

        Document {
            text,
            source: DocumentSource::MenuItem {
                id: item.id,
                name: item.name.clone(),
                category: item.category.clone(),
            },
        }
    }

    #[inline]
    pub fn order_document(&self, order: &Order, lines: &[&OrderLine]) -> Document {
        let items = if lines.is_empty() {
            "None".to_string()
        } else {
            lines
                .iter()
                .map(|line| format!("{}x {}", line.quantity, line.item_name))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut text = format!(
            "Order ID: {}\nCustomer: {}\nStatus: {}\nTotal Amount: {}\nDelivery Fee: {}\nGrand Total: {}\nItems: {}",
            order.order_ref,
            order.customer,
            order.status_label(),
            self.money(order.total_amount),
            self.money(order.delivery_fee),
            self.money(order.grand_total()),
            items,
        );
        for line in lines {
            let _ = write!(
                text,
                "\n  - {}: {} x {} = {}",
                line.item_name,
                line.quantity,
                self.money(line.price),
                self.money(line.subtotal())
            );
        }
        let _ = write!(
            text,
            "\nDelivery Address: {}\nDelivery Phone: {}\nCreated: {}",
            order.delivery_address,
            order.delivery_phone,
            order.created_at.format("%Y-%m-%d %H:%M"),
        );

        Document {
            text,
            source: DocumentSource::Order {
                id: order.id,
                order_ref: order.order_ref.clone(),
                status: order.status.clone(),
            },
        }
    }

    #[inline]
    pub fn payment_document(&self, payment: &Payment) -> Document {
        let text = format!(
            "Payment Transaction: {}\nOrder ID: {}\nPayment Method: {}\nPayment Status: {}\nAmount: {}\nUPI ID: {}\nCreated: {}\nPaid At: {}",
            payment.transaction_id,
            payment.order_ref,
            payment.method_label(),
            payment.status_label(),
            self.money(payment.amount),
            payment.upi_id.as_deref().unwrap_or("N/A"),
            payment.created_at.format("%Y-%m-%d %H:%M"),
            payment.paid_at.map_or_else(
                || "Not paid".to_string(),
                |paid| paid.format("%Y-%m-%d %H:%M").to_string()
            ),
        );

        Document {
            text,
            source: DocumentSource::Payment {
                id: payment.id,
                transaction_id: payment.transaction_id.clone(),
                order_ref: payment.order_ref.clone(),
            },
        }
    }
}
