use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("Starting preprocessing...");
        self.monitor.log_stats("Start");

        tracing::info!("Extracting dataset...");
        let raw_data = self.pipeline.extract().await?;
        tracing::info!("Extracted {} rows", raw_data.len());
        self.monitor.log_stats("Extract");

        tracing::info!("Aggregating by zip code...");
        let transformed = self.pipeline.transform(raw_data).await?;
        tracing::info!(
            "Aggregated {} zip codes",
            transformed.zipcode_stats.len()
        );
        self.monitor.log_stats("Transform");

        tracing::info!("Writing data files...");
        let output_path = self.pipeline.load(transformed).await?;
        tracing::info!("Data files saved to: {}", output_path);
        self.monitor.log_stats("Load");
        self.monitor.log_final_stats();

        Ok(output_path)
    }
}
