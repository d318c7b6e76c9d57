pub mod executor;
pub mod fleet;
pub mod locks;
pub mod reconciler;
