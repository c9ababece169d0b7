/// Adapter for platforms that redeliver completion through a system broadcast
pub mod broadcast;

/// Adapter for platforms that complete through a closure
pub mod closure;
