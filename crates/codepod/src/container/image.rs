//! Runtime image provisioning

use tracing::{debug, info, instrument};

use crate::container::{ContainerError, ContainerRuntime};

/// How an image became available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    /// Already present in the local image cache
    Present,
    /// Pulled during this call
    Pulled,
}

/// Make sure `image` is available locally, pulling it if inspection fails
///
/// Returns once the pull has fully completed. Pull errors are returned to the
/// caller unchanged.
#[instrument(skip(runtime))]
pub async fn ensure_image(
    runtime: &dyn ContainerRuntime,
    image: &str,
) -> Result<Provisioned, ContainerError> {
    match runtime.inspect_image(image).await {
        Ok(()) => {
            debug!("image present locally");
            Ok(Provisioned::Present)
        }
        Err(e) => {
            info!(reason = %e, "image not available locally, pulling");
            runtime.pull_image(image).await?;
            debug!("image pulled");
            Ok(Provisioned::Pulled)
        }
    }
}
