use tokio::sync::watch;

/// Creates a linked stop handle and run state token.
pub(crate) fn run_state() -> (StopHandle, RunState) {
    let (tx, rx) = watch::channel(false);
    (StopHandle(tx), RunState(rx))
}

/// Requests that the polling loop stop. Dropping the handle has the same effect.
pub(crate) struct StopHandle(watch::Sender<bool>);

impl StopHandle {
    pub(crate) fn stop(&self) {
        self.0.send_replace(true);
    }
}

/// Token checked by the polling loop on every iteration.
#[derive(Clone)]
pub(crate) struct RunState(watch::Receiver<bool>);

impl RunState {
    pub(crate) fn is_running(&self) -> bool {
        !*self.0.borrow() && self.0.has_changed().is_ok()
    }

    /// Resolves once a stop has been requested.
    pub(crate) async fn stopped(&mut self) {
        // An error means the handle is gone, which also counts as stopped
        let _ = self.0.wait_for(|stop| *stop).await;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn stop() {
        let (handle, mut state) = run_state();
        assert!(state.is_running());

        let waiter = {
            let mut state = state.clone();
            tokio::spawn(async move { state.stopped().await })
        };

        handle.stop();
        assert!(!state.is_running());

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        state.stopped().await;
    }

    #[tokio::test]
    async fn dropped_handle() {
        let (handle, mut state) = run_state();
        drop(handle);

        assert!(!state.is_running());
        tokio::time::timeout(Duration::from_secs(1), state.stopped())
            .await
            .unwrap();
    }
}
