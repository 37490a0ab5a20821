pub mod client;
pub mod gateway;
pub mod normalize;
pub mod paper;
pub mod price_feed;

pub use client::{CapitalClient, Credentials, SessionTokens};
pub use gateway::CapitalGateway;
pub use paper::PaperGateway;
pub use price_feed::{PriceFeed, PriceFeedConfig, PriceFeedError, PriceFeedStats};
