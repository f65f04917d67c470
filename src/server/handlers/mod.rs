pub mod health;
pub mod knowledge;
