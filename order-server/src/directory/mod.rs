//! Reference directory: restaurants, tables and menu items
//!
//! Orders only carry ids. Display data (table number, item names) and
//! ownership (owner and staff accounts) are looked up here. Missing
//! references resolve to `None`; callers decide how to render the gap.
//!
//! The in-memory implementation is seeded from a JSON file:
//!
//! ```json
//! {
//!   "restaurants": [{"id": "r1", "name": "Bistro", "address": "1 Main St",
//!                    "ownerId": "u1", "staffIds": ["u2"]}],
//!   "tables":      [{"id": "t1", "restaurantId": "r1", "tableNumber": 4}],
//!   "menuItems":   [{"id": "m1", "restaurantId": "r1", "name": "Soup", "price": 7.5}]
//! }
//! ```

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub owner_id: String,
    #[serde(default)]
    pub staff_ids: Vec<String>,
}

impl Restaurant {
    /// Owner or listed staff account
    pub fn is_staff(&self, user_id: &str) -> bool {
        self.owner_id == user_id || self.staff_ids.iter().any(|id| id == user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: String,
    pub restaurant_id: String,
    pub table_number: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: String,
    pub restaurant_id: String,
    pub name: String,
    pub price: f64,
}

/// Seed document for [`InMemoryDirectory`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectorySeed {
    #[serde(default)]
    pub restaurants: Vec<Restaurant>,
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub menu_items: Vec<MenuItem>,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Failed to read directory seed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid directory seed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Lookup of records owned by other services
pub trait Directory: Send + Sync {
    fn restaurant(&self, id: &str) -> Option<Restaurant>;
    fn table(&self, id: &str) -> Option<Table>;
    fn menu_item(&self, id: &str) -> Option<MenuItem>;

    fn table_number(&self, table_id: &str) -> Option<u32> {
        self.table(table_id).map(|t| t.table_number)
    }

    fn menu_item_name(&self, menu_item_id: &str) -> Option<String> {
        self.menu_item(menu_item_id).map(|m| m.name)
    }
}

/// Concurrent in-process directory
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    restaurants: DashMap<String, Restaurant>,
    tables: DashMap<String, Table>,
    menu_items: DashMap<String, MenuItem>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: DirectorySeed) -> Self {
        let directory = Self::new();
        for restaurant in seed.restaurants {
            directory.upsert_restaurant(restaurant);
        }
        for table in seed.tables {
            directory.upsert_table(table);
        }
        for item in seed.menu_items {
            directory.upsert_menu_item(item);
        }
        directory
    }

    /// Load a seed JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let seed: DirectorySeed = serde_json::from_str(&raw)?;

        tracing::info!(
            path = %path.display(),
            restaurants = seed.restaurants.len(),
            tables = seed.tables.len(),
            menu_items = seed.menu_items.len(),
            "Directory seed loaded"
        );
        Ok(Self::from_seed(seed))
    }

    pub fn upsert_restaurant(&self, restaurant: Restaurant) {
        self.restaurants.insert(restaurant.id.clone(), restaurant);
    }

    pub fn upsert_table(&self, table: Table) {
        self.tables.insert(table.id.clone(), table);
    }

    pub fn upsert_menu_item(&self, item: MenuItem) {
        self.menu_items.insert(item.id.clone(), item);
    }

    pub fn restaurant_count(&self) -> usize {
        self.restaurants.len()
    }
}

impl Directory for InMemoryDirectory {
    fn restaurant(&self, id: &str) -> Option<Restaurant> {
        self.restaurants.get(id).map(|r| r.value().clone())
    }

    fn table(&self, id: &str) -> Option<Table> {
        self.tables.get(id).map(|t| t.value().clone())
    }

    fn menu_item(&self, id: &str) -> Option<MenuItem> {
        self.menu_items.get(id).map(|m| m.value().clone())
    }
}
