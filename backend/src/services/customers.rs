use crate::workflows::{ActionError, CustomerRecordStore};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, error};
use uuid::Uuid;

/// Text columns of `customers` a workflow may set directly. Every other key
/// is merged into the `metadata` jsonb column.
const CUSTOMER_COLUMNS: [&str; 6] = ["first_name", "last_name", "email", "phone", "status", "notes"];

#[derive(Clone)]
pub struct PgCustomerRecordStore {
    pool: PgPool,
}

impl PgCustomerRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Split a patch into direct column updates and the metadata remainder.
/// camelCase keys map onto their snake_case columns.
fn split_patch(patch: Map<String, Value>) -> (Vec<(&'static str, Option<String>)>, Map<String, Value>) {
    let mut columns = Vec::new();
    let mut metadata = Map::new();

    for (key, value) in patch {
        let column = CUSTOMER_COLUMNS
            .iter()
            .copied()
            .find(|column| *column == to_snake_case(&key));

        match (column, &value) {
            (Some(column), Value::String(text)) => columns.push((column, Some(text.clone()))),
            (Some(column), Value::Null) => columns.push((column, None)),
            _ => {
                metadata.insert(key, value);
            }
        }
    }

    (columns, metadata)
}

fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[async_trait]
impl CustomerRecordStore for PgCustomerRecordStore {
    async fn update(&self, customer_id: Uuid, patch: Map<String, Value>) -> Result<(), ActionError> {
        let (columns, metadata) = split_patch(patch);

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE customers SET updated_at = NOW()");
        for (column, value) in columns {
            query.push(", ").push(column).push(" = ").push_bind(value);
        }
        if !metadata.is_empty() {
            query
                .push(", metadata = COALESCE(metadata, '{}'::jsonb) || ")
                .push_bind(sqlx::types::Json(Value::Object(metadata)));
        }
        query.push(" WHERE id = ").push_bind(customer_id);

        let result = query.build().execute(&self.pool).await.map_err(|e| {
            error!("Failed to update customer {}: {}", customer_id, e);
            ActionError::collaborator("customers", e)
        })?;

        if result.rows_affected() == 0 {
            return Err(ActionError::collaborator(
                "customers",
                format!("customer {} not found", customer_id),
            ));
        }

        debug!("Updated customer {}", customer_id);
        Ok(())
    }
}

/// Customer records held in memory, keyed by id. Updates merge top-level keys.
#[derive(Default)]
pub struct InMemoryCustomerRecordStore {
    customers: RwLock<HashMap<Uuid, Map<String, Value>>>,
}

impl InMemoryCustomerRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, customer_id: Uuid, record: Value) {
        let record = match record {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.customers.write().await.insert(customer_id, record);
    }

    pub async fn get(&self, customer_id: Uuid) -> Option<Value> {
        self.customers
            .read()
            .await
            .get(&customer_id)
            .cloned()
            .map(Value::Object)
    }
}

#[async_trait]
impl CustomerRecordStore for InMemoryCustomerRecordStore {
    async fn update(&self, customer_id: Uuid, patch: Map<String, Value>) -> Result<(), ActionError> {
        let mut customers = self.customers.write().await;
        let record = customers.get_mut(&customer_id).ok_or_else(|| {
            ActionError::collaborator("customers", format!("customer {} not found", customer_id))
        })?;
        record.extend(patch);
        Ok(())
    }
}
