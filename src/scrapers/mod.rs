pub mod browser;
pub mod detail;
pub mod http;
pub mod image;
pub mod listing;
pub mod price;
pub mod tagline;
pub mod text;
pub mod traits;
pub mod types;

pub use browser::{BrowserFetcher, ListingBrowser};
pub use http::HttpFetcher;
pub use traits::PageFetcher;
pub use types::ScrapeParams;
