pub mod health;
pub mod metrics;
pub mod offers;
pub mod reconcile;
pub mod webhooks;
