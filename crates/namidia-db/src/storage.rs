//! # Cart Snapshot Storage
//!
//! File-backed [`CartStorage`] for the cart between sessions. One JSON array
//! of cart items per file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use namidia_core::cart::CartStorage;
use namidia_core::{CartItem, CoreError, CoreResult};

/// Stores the cart as pretty JSON at a fixed path.
///
/// Writes go to a sibling `.tmp` file first and are renamed over the
/// snapshot, so a crash mid-write leaves the previous cart intact.
#[derive(Debug, Clone)]
pub struct JsonFileCartStorage {
    path: PathBuf,
}

impl JsonFileCartStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileCartStorage { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

impl CartStorage for JsonFileCartStorage {
    fn load(&self) -> CoreResult<Option<Vec<CartItem>>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error("read", &self.path, e)),
        };

        let items: Vec<CartItem> = serde_json::from_str(&contents)?;
        debug!(path = %self.path.display(), lines = items.len(), "Loaded cart snapshot");
        Ok(Some(items))
    }

    fn save(&self, items: &[CartItem]) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| storage_error("create", parent, e))?;
        }

        let json = serde_json::to_string_pretty(items)?;
        let tmp = self.temp_path();

        fs::write(&tmp, json).map_err(|e| storage_error("write", &tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| storage_error("replace", &self.path, e))?;

        debug!(path = %self.path.display(), lines = items.len(), "Saved cart snapshot");
        Ok(())
    }
}

fn storage_error(action: &str, path: &Path, err: std::io::Error) -> CoreError {
    CoreError::Storage(format!("failed to {} {}: {}", action, path.display(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use namidia_core::{CartStore, Product};
    use std::sync::Arc;

    fn temp_file() -> PathBuf {
        std::env::temp_dir()
            .join(format!("namidia-cart-{}", uuid::Uuid::new_v4()))
            .join("cart.json")
    }

    fn product(id: &str, price_cents: i64, promo: Option<i64>) -> Product {
        Product {
            id: id.to_string(),
            name: id.to_uppercase(),
            image_url: None,
            price_cents,
            promo_price_cents: promo,
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let storage = JsonFileCartStorage::new(temp_file());
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_cart_survives_restart() {
        let path = temp_file();

        {
            let store = CartStore::restore(Arc::new(JsonFileCartStorage::new(&path)));
            store.add_item(&product("a", 1000, None));
            store.add_item(&product("a", 1000, None));
            store.add_item(&product("b", 500, Some(300)));
        }

        let store = CartStore::restore(Arc::new(JsonFileCartStorage::new(&path)));
        assert_eq!(store.calculate_total().cents(), 2300);
        assert_eq!(store.snapshot().total_quantity(), 3);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let path = temp_file();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{not json").unwrap();

        let storage = JsonFileCartStorage::new(&path);
        assert!(matches!(storage.load(), Err(CoreError::Snapshot(_))));

        // the store shrugs it off
        let store = CartStore::restore(Arc::new(storage));
        assert!(store.snapshot().is_empty());

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
