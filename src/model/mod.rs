pub mod article;
pub mod price_bar;
