/// One CLI invocation's view of the library
use crate::config::CliConfig;
use anyhow::{Context, Result};
use flashtune_client::{BackendClient, ClientConfig};
use flashtune_usb::{Library, MirrorStatus, UsbError, VolumePicker, VolumeProvider, VolumeStatus};
use std::sync::Arc;

pub struct Session {
    pub config: CliConfig,
    pub client: BackendClient,
    pub provider: Arc<VolumeProvider>,
    pub library: Library,
    pub volume: Option<VolumeStatus>,
}

impl Session {
    pub async fn open(config: CliConfig, picker: Arc<dyn VolumePicker>) -> Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .with_context(|| format!("Failed to create {}", config.data_dir.display()))?;
        tokio::fs::create_dir_all(&config.cache_dir)
            .await
            .with_context(|| format!("Failed to create {}", config.cache_dir.display()))?;

        let client = BackendClient::new(
            ClientConfig::new(&config.backend_url).with_api_key(&config.api_key),
        )?;
        let provider = Arc::new(VolumeProvider::new(&config.data_dir, picker));
        let library = Library::open(provider.clone(), &config.cache_dir).await?;

        Ok(Self {
            config,
            client,
            provider,
            library,
            volume: None,
        })
    }

    /// Attach the granted volume if there is one
    ///
    /// Without a volume the session keeps working on the local copy.
    pub async fn connect(&mut self) -> Result<Option<&VolumeStatus>> {
        if self.volume.is_none() {
            match self.library.connect().await {
                Ok(status) => {
                    if !status.restored {
                        println!("No library found on {}, starting a new one", status.root);
                    }
                    self.volume = Some(status);
                }
                Err(UsbError::PermissionCancelled) => {
                    tracing::debug!("No volume granted");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Volume unavailable, using the local copy");
                }
            }
        }
        Ok(self.volume.as_ref())
    }

    pub fn require_volume(&self) -> Result<&VolumeStatus> {
        self.volume
            .as_ref()
            .context("No USB volume attached; run `flashtune attach <path>` first")
    }

    /// Detach and close the database, reporting a stale volume copy
    pub async fn close(self) -> Result<()> {
        let outcome = self.library.close().await?;
        if let Some(warning) = outcome.warning() {
            eprintln!("warning: final sync to the volume failed: {}", warning);
        }
        Ok(())
    }
}

/// Print a warning when a write did not reach the volume
pub fn report_mirror(mirror: &MirrorStatus) {
    match mirror {
        MirrorStatus::Synced => {}
        MirrorStatus::Detached => {
            println!("(saved locally; no volume attached)");
        }
        MirrorStatus::Failed(message) => {
            eprintln!("warning: saved locally but the volume copy is stale: {}", message);
        }
    }
}
