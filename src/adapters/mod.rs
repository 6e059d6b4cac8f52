pub mod api_errors;
pub mod entitlement;
pub mod gateway;
pub mod notification;
