//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::errors::CamError;
use crate::orchestrator::Orchestrator;
use crate::workers::{listener, motion, preview, status};

/// Run the camera daemon until `shutdown_signal` resolves
pub async fn run(
    version: String,
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), CamError> {
    info!("Initializing camera daemon...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(version, &options, shutdown_tx.clone(), &mut shutdown_manager).await {
        error!("Failed to start camera daemon: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    // Shutdown
    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    version: String,
    options: &AppOptions,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<Arc<AppState>, CamError> {
    let app_state = Arc::new(AppState::init(version, options).await?);
    shutdown_manager.with_app_state(app_state.clone())?;

    init_status_worker(
        options.status_worker.clone(),
        app_state.orchestrator.clone(),
        shutdown_manager,
        shutdown_tx.subscribe(),
    )?;

    if options.enable_motion_worker {
        init_motion_worker(
            options.motion_worker.clone(),
            app_state.orchestrator.clone(),
            shutdown_manager,
            shutdown_tx.subscribe(),
        )?;
    }

    if options.enable_preview_worker {
        init_preview_worker(
            options.preview_worker.clone(),
            app_state.orchestrator.clone(),
            shutdown_manager,
            shutdown_tx.subscribe(),
        )?;
    }

    init_listener_worker(
        options.listener.clone(),
        app_state.orchestrator.clone(),
        shutdown_manager,
        shutdown_tx.subscribe(),
    )?;

    info!(
        "Camera daemon {} running with {} camera(s)",
        app_state.version,
        app_state.orchestrator.sessions().len()
    );
    Ok(app_state)
}

fn init_listener_worker(
    options: listener::Options,
    orchestrator: Arc<Orchestrator>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), CamError> {
    info!("Initializing command listener...");

    let listener_handle = tokio::spawn(async move {
        listener::run(
            &options,
            orchestrator.as_ref(),
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_listener_worker_handle(listener_handle)?;
    Ok(())
}

fn init_motion_worker(
    options: motion::Options,
    orchestrator: Arc<Orchestrator>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), CamError> {
    info!("Initializing motion worker...");

    let motion_handle = tokio::spawn(async move {
        motion::run(
            &options,
            orchestrator.as_ref(),
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_motion_worker_handle(motion_handle)?;
    Ok(())
}

fn init_preview_worker(
    options: preview::Options,
    orchestrator: Arc<Orchestrator>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), CamError> {
    info!("Initializing preview worker...");

    let preview_handle = tokio::spawn(async move {
        preview::run(
            &options,
            orchestrator.as_ref(),
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_preview_worker_handle(preview_handle)?;
    Ok(())
}

fn init_status_worker(
    options: status::Options,
    orchestrator: Arc<Orchestrator>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), CamError> {
    info!("Initializing status worker...");

    let status_handle = tokio::spawn(async move {
        status::run(
            &options,
            orchestrator.as_ref(),
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_status_worker_handle(status_handle)?;
    Ok(())
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    app_state: Option<Arc<AppState>>,
    listener_worker_handle: Option<JoinHandle<()>>,
    motion_worker_handle: Option<JoinHandle<()>>,
    preview_worker_handle: Option<JoinHandle<()>>,
    status_worker_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            app_state: None,
            listener_worker_handle: None,
            motion_worker_handle: None,
            preview_worker_handle: None,
            status_worker_handle: None,
        }
    }

    pub fn with_app_state(&mut self, state: Arc<AppState>) -> Result<(), CamError> {
        if self.app_state.is_some() {
            return Err(CamError::ShutdownError("app_state already set".to_string()));
        }
        self.app_state = Some(state);
        Ok(())
    }

    pub fn with_listener_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), CamError> {
        if self.listener_worker_handle.is_some() {
            return Err(CamError::ShutdownError("listener_handle already set".to_string()));
        }
        self.listener_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_motion_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), CamError> {
        if self.motion_worker_handle.is_some() {
            return Err(CamError::ShutdownError("motion_handle already set".to_string()));
        }
        self.motion_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_preview_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), CamError> {
        if self.preview_worker_handle.is_some() {
            return Err(CamError::ShutdownError("preview_handle already set".to_string()));
        }
        self.preview_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_status_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), CamError> {
        if self.status_worker_handle.is_some() {
            return Err(CamError::ShutdownError("status_handle already set".to_string()));
        }
        self.status_worker_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), CamError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.lifecycle_options.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), CamError> {
        info!("Shutting down camera daemon...");

        // 1. Command listener, so no new line starts
        if let Some(handle) = self.listener_worker_handle.take() {
            handle.await.map_err(|e| CamError::ShutdownError(e.to_string()))?;
        }

        // 2. Motion worker
        if let Some(handle) = self.motion_worker_handle.take() {
            handle.await.map_err(|e| CamError::ShutdownError(e.to_string()))?;
        }

        // 3. Preview worker
        if let Some(handle) = self.preview_worker_handle.take() {
            handle.await.map_err(|e| CamError::ShutdownError(e.to_string()))?;
        }

        // 4. Status worker
        if let Some(handle) = self.status_worker_handle.take() {
            handle.await.map_err(|e| CamError::ShutdownError(e.to_string()))?;
        }

        // 5. Cameras: finalize recordings and drain session locks
        if let Some(app_state) = self.app_state.take() {
            app_state.shutdown().await?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
