pub mod kalshi;
pub mod polymarket;
