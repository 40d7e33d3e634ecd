use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::{Mutex, OnceLock};

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Installs the process-wide Prometheus recorder. Safe to call more than
/// once and from several threads; only the first call installs.
pub fn init_metrics() -> Result<(), anyhow::Error> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let _guard = INIT_LOCK
        .lock()
        .map_err(|e| anyhow::anyhow!("Metrics init lock poisoned: {}", e))?;
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    METRICS_HANDLE
        .set(handle)
        .map_err(|_| anyhow::anyhow!("Prometheus handle already set"))?;
    Ok(())
}

/// Metrics in Prometheus text format.
pub fn render_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concurrent_init_installs_once() {
        let handles: Vec<_> = (0..8).map(|_| std::thread::spawn(init_metrics)).collect();
        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }

        ::metrics::counter!("init_test_total").increment(1);
        assert!(render_metrics().contains("init_test_total"));
    }
}
