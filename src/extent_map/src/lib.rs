mod config;
mod error;
mod extent;
mod map;
mod store;

pub use config::ExtentMapConfig;
pub use error::*;
pub use extent::Extent;
pub use map::ExtentMap;
pub use store::ExtentStore;
