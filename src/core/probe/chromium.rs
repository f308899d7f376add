use super::{ProbeSession, RuntimeProbe, TelemetryHandle, ValueHandle};
use crate::core::config::{NavigationOptions, ProbeConfig};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;

/// `RuntimeProbe` driving a local Chromium over the DevTools protocol.
pub struct ChromiumProbe {
    config: ProbeConfig,
}

impl ChromiumProbe {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    fn browser_config(&self) -> Result<BrowserConfig, AppError> {
        let mut builder = BrowserConfig::builder();
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(ref executable) = self.config.executable {
            builder = builder.chrome_executable(executable);
        }
        builder.build().map_err(|e| {
            AppError::new(
                ErrorCategory::ProbeError,
                format!("Invalid browser configuration: {}", e),
            )
        })
    }
}

#[async_trait]
impl RuntimeProbe for ChromiumProbe {
    async fn launch(&self) -> Result<Box<dyn ProbeSession>, AppError> {
        let (browser, mut handler) = Browser::launch(self.browser_config()?)
            .await
            .map_err(|e| probe_error("Failed to launch browser", e))?;

        let event_loop = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    tracing::debug!(error = %err, "browser handler stopped");
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| probe_error("Failed to open page", e))?;

        tracing::info!(headless = self.config.headless, "launched browser");
        Ok(Box::new(ChromiumSession {
            browser,
            page,
            event_loop,
        }))
    }
}

struct ChromiumSession {
    browser: Browser,
    page: Page,
    event_loop: JoinHandle<()>,
}

#[async_trait]
impl ProbeSession for ChromiumSession {
    async fn navigate(&mut self, url: &str, options: &NavigationOptions) -> Result<(), AppError> {
        let navigation = self.page.goto(url);
        let result = match options.timeout() {
            Some(limit) => tokio::time::timeout(limit, navigation).await.map_err(|_| {
                AppError::new(
                    ErrorCategory::ProbeError,
                    format!("Navigation to {} timed out after {:?}", url, limit),
                )
            })?,
            None => navigation.await,
        };
        result.map_err(|e| probe_error(&format!("Failed to navigate to {}", url), e))?;
        Ok(())
    }

    async fn read_global(&mut self, global: &str) -> Result<Box<dyn TelemetryHandle>, AppError> {
        let expression = format!("window.{}", global);
        let evaluation = self
            .page
            .evaluate(expression.as_str())
            .await
            .map_err(|e| probe_error("Failed to read telemetry global", e))?;
        // `undefined` carries no value, which is recorded as null.
        let value = evaluation.into_value::<Value>().unwrap_or(Value::Null);
        Ok(Box::new(ValueHandle(value)))
    }

    async fn close(self: Box<Self>) -> Result<(), AppError> {
        let ChromiumSession {
            mut browser,
            event_loop,
            ..
        } = *self;
        browser
            .close()
            .await
            .map_err(|e| probe_error("Failed to close browser", e))?;
        if let Err(err) = browser.wait().await {
            tracing::debug!(error = %err, "browser process did not exit cleanly");
        }
        event_loop.abort();
        Ok(())
    }
}

fn probe_error(message: &str, error: impl std::error::Error + Send + Sync + 'static) -> AppError {
    AppError::with_source(
        ErrorCategory::ProbeError,
        format!("{}: {}", message, error),
        error,
    )
}
