/// Receives progress of a long-running history run.
pub trait Progress: Send + Sync {
    /// Label for the current stage, e.g. "History" or "Waiting".
    fn set_phase(&self, phase: &str);

    /// Report progress through a callback returning `(total, current, message)`.
    fn set_determinate(&self, callback: Box<dyn Fn() -> (u64, u64, String) + Send + Sync + 'static>);

    /// Report activity of unknown length through a message callback.
    fn set_indeterminate(&self, callback: Box<dyn Fn() -> String + Send + Sync + 'static>);

    /// Print a line without disturbing the indicator.
    fn println(&self, msg: &str);

    fn done(&self);
}
