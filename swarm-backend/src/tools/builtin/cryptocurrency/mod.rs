pub mod build_transfer;
pub mod to_raw_amount;
pub mod token_lookup;

pub use build_transfer::BuildTransferTool;
pub use to_raw_amount::ToRawAmountTool;
pub use token_lookup::TokenLookupTool;
