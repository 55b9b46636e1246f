pub mod buyer;
pub mod seller;
pub mod shared;
