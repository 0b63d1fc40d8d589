//! Order fulfillment saga state used across the saga tests.

use cas_persistence::{CorrelationProperty, SagaCollections, SagaData, SagaPersister};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ORDER_SAGA_TYPE: &str = "Shop.OrderSagaData";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SagaData)]
#[saga(name = "Shop.OrderSagaData")]
pub struct OrderSagaData {
    pub id: Uuid,
    pub order_id: String,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Placed,
    Billed,
    Shipped,
}

impl OrderSagaData {
    pub fn placed(order_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id: order_id.to_string(),
            status: OrderStatus::Placed,
        }
    }

    pub fn correlation(&self) -> CorrelationProperty {
        CorrelationProperty::new("OrderId", &self.order_id)
    }
}

pub fn order_sagas() -> SagaPersister {
    SagaPersister::new(SagaCollections::new().register::<OrderSagaData>("OrderSagaDatas"))
}
