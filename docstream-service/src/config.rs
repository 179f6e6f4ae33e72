//! Service configuration: typed settings and the file/env loader.

mod loader;
mod static_config;

pub use loader::load_config;
pub use static_config::{ModelsConfig, ObjectStoreConfig, StorageConfig};
