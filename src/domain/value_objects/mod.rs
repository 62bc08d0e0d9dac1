pub mod price;
pub mod profit;
pub mod quantity;
