pub mod bcv;
pub mod extract;

pub use bcv::BcvProvider;
pub use extract::{RateExtractor, UsdTextExtractor};
