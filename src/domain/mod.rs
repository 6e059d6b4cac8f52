pub mod entitlement;
pub mod error;
pub mod gateway;
pub mod id;
pub mod notification;
pub mod payment;
pub mod store;

use std::{future::Future, pin::Pin};

/// Boxed future returned by the port traits, so they stay usable as `dyn`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
