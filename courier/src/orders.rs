use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::ProcessorError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub pin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub name: String,
    pub price: f64,
    pub qty: u32,
    pub image_url: String,
    pub discount: u32,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    pub customer: Customer,
    pub items: Vec<OrderItem>,
    pub created_at: String,
    pub status: String,
    pub delivery_date: String,
    pub delivery_charges: f64,
}

impl Order {
    /// Grand total across item totals plus delivery charges.
    pub fn total(&self) -> f64 {
        self.items.iter().map(|item| item.total).sum::<f64>() + self.delivery_charges
    }
}

/// Read-only access to the orders store. The table is owned by the ordering
/// system; courier only ever reads the JSONB document for one order.
pub struct OrdersRepo {
    pool: PgPool,
}

impl OrdersRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_order(&self, order_id: &str) -> Result<Order, ProcessorError> {
        let row: Option<sqlx::types::Json<Order>> =
            sqlx::query_scalar("SELECT data FROM orders WHERE id = $1")
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|json| json.0)
            .ok_or_else(|| ProcessorError::OrderNotFound(order_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_order;

    #[test]
    fn order_total_includes_delivery_charges() {
        let order = sample_order();
        assert!((order.total() - 162.5).abs() < f64::EPSILON);
    }

    #[test]
    fn order_decodes_from_stored_document() {
        let stored = serde_json::to_string(&sample_order()).unwrap();
        let decoded: Order = serde_json::from_str(&stored).unwrap();
        assert_eq!(decoded, sample_order());
    }
}
