//! Message schema registry
//!
//! Maps numeric message type ids to their field layouts. The codec needs a
//! schema to decode a payload; the runtime needs the same schema to lay out
//! persistence columns and to build outbound messages.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use types::definitions::standard_schemas;
use types::{MessageSchema, MessageTypeId};

#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<MessageTypeId, Arc<MessageSchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with every standard message definition
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for schema in standard_schemas() {
            registry.schemas.insert(schema.type_id, schema);
        }
        registry
    }

    /// Add or replace a schema
    pub fn register(&mut self, schema: MessageSchema) -> Arc<MessageSchema> {
        let schema = Arc::new(schema);
        if let Some(old) = self.schemas.insert(schema.type_id, schema.clone()) {
            debug!(
                "Replaced schema {} for message type {} with {}",
                old.name, schema.type_id, schema.name
            );
        }
        schema
    }

    pub fn get(&self, type_id: MessageTypeId) -> Option<Arc<MessageSchema>> {
        self.schemas.get(&type_id).cloned()
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<MessageSchema>> {
        self.schemas.values().find(|s| s.name == name).cloned()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
