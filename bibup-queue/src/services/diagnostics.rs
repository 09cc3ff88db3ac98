//! Diagnostics sink backed by `tracing`

use super::DiagnosticsSink;

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticsSink for TracingDiagnostics {
    fn log_error(&self, context: &str, error: &(dyn std::error::Error + 'static)) {
        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }

        if chain.is_empty() {
            tracing::error!(context, error = %error, "Operation failed");
        } else {
            tracing::error!(context, error = %error, causes = ?chain, "Operation failed");
        }
    }
}
