//! Wiring: one export run, and the long-running service.

use std::sync::Arc;

use fiserv_session::{
    AccountExport, ArtifactSink, Orchestrator, Pacing, ReqwestTransport, SessionClient,
    SessionError, Transport,
};

use crate::config::ResolvedConfig;
use crate::export::CsvExporter;
use crate::schedule::DailySchedule;
use crate::status;

/// Build an orchestrator talking to the live portal.
pub fn build_orchestrator(config: &ResolvedConfig) -> anyhow::Result<Orchestrator<ReqwestTransport>> {
    let transport = ReqwestTransport::new(config.request_timeout)?;
    Ok(orchestrator_with(transport, config, Pacing::default()))
}

/// Build an orchestrator over any transport.
pub fn orchestrator_with<T: Transport>(
    transport: T,
    config: &ResolvedConfig,
    pacing: Pacing,
) -> Orchestrator<T> {
    let client = SessionClient::new(
        transport,
        config.institution,
        config.username.clone(),
        config.password.clone(),
        config.client.clone(),
    );
    Orchestrator::new(client, config.answers.clone(), pacing)
}

/// Run one export, logging the outcome.
pub async fn export_once<T: Transport>(
    orchestrator: &Orchestrator<T>,
    sink: &dyn ArtifactSink,
) -> Result<Vec<AccountExport>, SessionError> {
    match orchestrator.run(sink).await {
        Ok(exports) => {
            let transactions: usize = exports.iter().map(|e| e.transactions.len()).sum();
            tracing::info!(
                "export finished, accounts: {}, transactions: {}",
                exports.len(),
                transactions
            );
            Ok(exports)
        }
        Err(e) => {
            tracing::error!(
                kind = ?e.kind(),
                step = e.step().map(|s| s.number()),
                "export failed: {e}"
            );
            Err(e)
        }
    }
}

/// Status server, one export now, then the daily schedule. Failed runs are
/// logged and the service waits for the next trigger.
pub async fn serve(config: ResolvedConfig) -> anyhow::Result<()> {
    let listener = status::bind(&config.status_host, config.status_port).await?;
    tokio::spawn(async move {
        if let Err(e) = status::serve(listener).await {
            tracing::error!("status server stopped: {e}");
        }
    });

    let orchestrator = Arc::new(build_orchestrator(&config)?);
    let exporter = Arc::new(CsvExporter::new(&config.output_dir));

    let _ = export_once(orchestrator.as_ref(), exporter.as_ref()).await;

    DailySchedule::default()
        .run(|| {
            let orchestrator = Arc::clone(&orchestrator);
            let exporter = Arc::clone(&exporter);
            async move {
                let _ = export_once(orchestrator.as_ref(), exporter.as_ref()).await;
            }
        })
        .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExporterConfig;
    use async_trait::async_trait;
    use fiserv_session::{ErrorKind, HttpRequest, HttpResponse, Step, TransportError};

    struct Offline;

    #[async_trait]
    impl Transport for Offline {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError::Timeout)
        }
    }

    fn resolved() -> ResolvedConfig {
        ExporterConfig {
            url: "https://www.ffl.net".to_string(),
            username: "jane".to_string(),
            password: "hunter2".to_string(),
            ..ExporterConfig::default()
        }
        .resolve()
        .unwrap()
    }

    #[tokio::test]
    async fn failed_run_reports_transport_error_at_login() {
        let config = resolved();
        let orchestrator = orchestrator_with(Offline, &config, Pacing::immediate());
        let dir = tempfile::tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path());

        let err = export_once(&orchestrator, &exporter).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.step(), Some(Step::StartLogin));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn live_orchestrator_builds_from_config() {
        let config = resolved();
        let orchestrator = build_orchestrator(&config).unwrap();
        assert_eq!(orchestrator.client().institution().routing_number, "241071212");
    }
}
