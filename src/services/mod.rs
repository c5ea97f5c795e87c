pub mod dispatch;
pub mod identity;
pub mod intake;
#[cfg(feature = "relay")]
pub mod relay;
pub mod replies;
