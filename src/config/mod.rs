pub mod catalog;
pub mod layers;
pub mod manager;
pub mod mutation;
pub mod search;
pub mod traits;

pub use catalog::CatalogConfig;
pub use layers::LayerSamplingConfig;
pub use manager::{AppConfig, ConfigManager};
pub use mutation::MutationOptions;
pub use search::SearchConfig;
pub use traits::{ConfigManifest, ConfigSection, FieldManifest};
