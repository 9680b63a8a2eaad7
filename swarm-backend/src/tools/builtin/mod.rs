pub mod cryptocurrency;
pub mod price_lookup;
pub mod social_media;

pub use cryptocurrency::{BuildTransferTool, ToRawAmountTool, TokenLookupTool};
pub use price_lookup::PriceLookupTool;
pub use social_media::ComposePostTool;
