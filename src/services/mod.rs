pub mod aggregate;
pub mod droid;
pub mod export;
pub mod fetcher;
pub mod scrape;

pub use aggregate::*;
pub use droid::*;
pub use export::*;
pub use fetcher::*;
pub use scrape::*;
