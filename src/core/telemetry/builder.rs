use super::TELEMETRY_GLOBAL;

/// Renders JavaScript snippets that instrumentation plugins inject into target files.
///
/// All snippets address the same window global the probe reads back after each navigation.
#[derive(Debug, Clone)]
pub struct TelemetryBuilder {
    global: String,
}

impl Default for TelemetryBuilder {
    fn default() -> Self {
        Self::new(TELEMETRY_GLOBAL)
    }
}

impl TelemetryBuilder {
    pub fn new<T: Into<String>>(global: T) -> Self {
        Self {
            global: global.into(),
        }
    }

    /// Fully qualified global, e.g. `window.__tracefix_telemetry`.
    pub fn global(&self) -> String {
        format!("window.{}", self.global)
    }

    /// Initializes the global once per page.
    pub fn preamble(&self) -> String {
        let global = self.global();
        format!("if (!{global}) {{\n  {global} = {{}};\n}}\n")
    }

    /// Member access for `key`, where `key` is a JavaScript expression.
    pub fn path(&self, key: &str) -> String {
        format!("{}[{}]", self.global(), key)
    }

    pub fn conditionally_add(
        &self,
        key: &str,
        consequence: impl FnOnce() -> String,
        alternative: impl FnOnce() -> String,
    ) -> String {
        format!(
            "if ({}) {{\n  {}\n}} else {{\n  {}\n}}\n",
            self.path(key),
            consequence(),
            alternative()
        )
    }
}
