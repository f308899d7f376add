//! Browser-driving boundary. The core only needs: launch, navigate, wait, read a global, close.

mod chromium;

pub use chromium::ChromiumProbe;

use crate::core::config::NavigationOptions;
use crate::core::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

#[async_trait]
pub trait RuntimeProbe: Send + Sync {
    /// Start the browser and open the single page used for the whole run.
    async fn launch(&self) -> Result<Box<dyn ProbeSession>, AppError>;
}

#[async_trait]
pub trait ProbeSession: Send {
    async fn navigate(&mut self, url: &str, options: &NavigationOptions) -> Result<(), AppError>;

    /// Settle delay between navigation and read-back.
    async fn wait(&mut self, delay: Duration) -> Result<(), AppError> {
        tokio::time::sleep(delay).await;
        Ok(())
    }

    /// Zero-argument read of `window.<global>` in the page context.
    async fn read_global(&mut self, global: &str) -> Result<Box<dyn TelemetryHandle>, AppError>;

    async fn close(self: Box<Self>) -> Result<(), AppError>;
}

/// Handle to a value read from the page. Dispose once the value has been copied out.
#[async_trait]
pub trait TelemetryHandle: Send {
    /// `Value::Null` when the global was never set.
    async fn json_value(&self) -> Result<Value, AppError>;

    async fn dispose(self: Box<Self>) -> Result<(), AppError>;
}

/// Handle over a value that was already copied out of the page.
pub struct ValueHandle(pub Value);

#[async_trait]
impl TelemetryHandle for ValueHandle {
    async fn json_value(&self) -> Result<Value, AppError> {
        Ok(self.0.clone())
    }

    async fn dispose(self: Box<Self>) -> Result<(), AppError> {
        Ok(())
    }
}
