use tokio_util::sync::CancellationToken;

/// Local abort trigger for one streaming session.
///
/// Cancelling only stops the client from reading; the backend keeps
/// producing unless a cancel request is also sent.
#[derive(Clone, Debug, Default)]
pub struct StreamCancel {
    token: CancellationToken,
}

impl StreamCancel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a trigger that is also cancelled when `parent` is.
    pub fn child_of(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}
