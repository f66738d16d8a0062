/// Failures returned across the public boundary. Everything else surfaces as
/// an `AdEvent::Error`.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("render target slot is not attached to a host container")]
    RenderTargetDetached,
}
