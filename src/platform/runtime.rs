use std::future::Future;

/// Runs `future` in the background.
///
/// Inside a tokio runtime the task is spawned on it; otherwise a dedicated
/// thread drives the future to completion.
pub fn spawn_detached<F>(future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    use tokio::runtime::Handle;

    if let Ok(handle) = Handle::try_current() {
        handle.spawn(future);
    } else {
        std::thread::spawn(move || futures::executor::block_on(future));
    }
}
