pub mod cleanup;
pub mod reconcile;
