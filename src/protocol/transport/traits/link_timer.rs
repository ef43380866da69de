//! Asynchronous timer abstraction providing the timing primitives required
//! by claim windows, transfer deadlines, and the publication cadence.

/// Timer trait abstraction; must remain thread-safe when applicable.
///
/// `Clone` is a supertrait because every actor (claim engine, transfer
/// slots, publish scheduler) owns its own timer handle. Implementations
/// are expected to be cheap handles over a shared clock.
pub trait LinkTimer: Clone {
    /// Asynchronously wait for `millis` milliseconds.
    fn delay_ms<'a>(
        &'a mut self,
        millis: u32,
    ) -> impl core::future::Future<Output = ()> + 'a;

    /// Milliseconds elapsed on a monotonic clock. Only differences are
    /// meaningful; the epoch is implementation-defined.
    fn now_ms(&mut self) -> u64;
}
