mod cache;
mod coingecko;
mod jsonl_store;
mod models;
mod oracle;
mod store;

pub use cache::{PriceCache, PriceError};
pub use coingecko::CoinGeckoOracle;
pub use jsonl_store::JsonlPriceStore;
pub use models::PricePoint;
pub use oracle::{OracleError, PriceOracle};
pub use store::{MemoryPriceStore, PriceStore, StoreError};
