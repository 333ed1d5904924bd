pub mod campaign;
pub mod health;
pub mod points;
pub mod referral;
