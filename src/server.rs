//! Reference storefront runtime.
//!
//! [`ServerHandle`] wires the in-memory platform, the link-order service and
//! the HTTP router together, binds the listener and owns graceful shutdown.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{error, info, warn};

use crate::application::{LinkOrderService, LinkOrderSettings, RULES_CONFIG_KEY};
use crate::config::AppConfig;
use crate::infrastructure::{InMemoryPlatform, SalesChannelDefaults};
use crate::interfaces::http::middleware::AdminAuthState;
use crate::interfaces::http::{create_storefront_router, AppState};
use crate::shared::{ShutdownCoordinator, ShutdownSignal};

/// Options for starting the storefront.
pub struct ServerOptions {
    pub config: AppConfig,
    /// Install the global Prometheus recorder (default: true). Tests that
    /// start several servers in one process turn this off.
    pub install_metrics_recorder: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            install_metrics_recorder: true,
        }
    }
}

/// The global metrics recorder can only be installed once per process.
fn prometheus_handle(install: bool) -> PrometheusHandle {
    static PROM_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

    if !install {
        return PrometheusBuilder::new().build_recorder().handle();
    }

    let installed = PROM_HANDLE.get_or_init(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            info!("📊 Prometheus metrics recorder installed");
            Some(handle)
        }
        Err(e) => {
            warn!("Prometheus recorder not installed: {}", e);
            None
        }
    });

    installed
        .clone()
        .unwrap_or_else(|| PrometheusBuilder::new().build_recorder().handle())
}

/// Handle to a running storefront.
pub struct ServerHandle {
    pub platform: InMemoryPlatform,
    pub link_order: Arc<LinkOrderService>,
    pub config: AppConfig,
    /// Address the listener actually bound (port 0 resolves here)
    pub local_addr: SocketAddr,

    shutdown: ShutdownCoordinator,
    http_task: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Start the storefront:
    /// 1. Install the Prometheus recorder
    /// 2. Seed the in-memory platform (catalog, rule setting)
    /// 3. Build the link-order service and router
    /// 4. Bind and serve with graceful shutdown
    pub async fn start(opts: ServerOptions) -> Result<Self, Box<dyn std::error::Error>> {
        let app_cfg = opts.config;
        app_cfg.validate()?;

        info!("Starting Link Order storefront...");

        let metrics = prometheus_handle(opts.install_metrics_recorder);

        // ── Platform ───────────────────────────────────────────
        let platform = InMemoryPlatform::new(
            SalesChannelDefaults::from(&app_cfg.sales_channel),
            &app_cfg.catalog,
        );
        platform
            .system_config
            .insert(RULES_CONFIG_KEY, &app_cfg.link_order.article_and_prices);
        info!(
            products = platform.catalog.len(),
            "In-memory catalog seeded"
        );

        // ── Link order service ─────────────────────────────────
        let settings = LinkOrderSettings::from(&app_cfg.link_order);
        info!(
            parameter = %settings.query_parameter,
            redirect = %settings.redirect_target,
            "Link order handler enabled"
        );
        let link_order = Arc::new(LinkOrderService::new(
            platform.sessions.clone(),
            platform.catalog.clone(),
            platform.carts.clone(),
            platform.system_config.clone(),
            settings,
        ));

        // ── HTTP ───────────────────────────────────────────────
        let admin_auth = app_cfg.admin.api_key.as_deref().map(AdminAuthState::new);
        if admin_auth.is_none() {
            warn!("No admin.api_key configured; rule administration API disabled");
        }

        let router = create_storefront_router(AppState {
            link_order: link_order.clone(),
            sessions: platform.sessions.clone(),
            carts: platform.carts.clone(),
            system_config: platform.system_config.clone(),
            shop_name: app_cfg.sales_channel.name.clone(),
            metrics,
            started_at: Arc::new(Instant::now()),
            admin_auth,
        });

        let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);
        let shutdown_signal = shutdown.signal();

        let listener = tokio::net::TcpListener::bind(app_cfg.address()).await?;
        let local_addr = listener.local_addr()?;
        info!("Storefront listening on http://{}", local_addr);
        info!("Swagger UI available at http://{}/docs/", local_addr);

        let http_server = axum::serve(listener, router).with_graceful_shutdown(async move {
            shutdown_signal.wait().await;
            info!("🛑 HTTP server received shutdown signal");
        });

        let http_task = tokio::spawn(async move {
            if let Err(e) = http_server.await {
                error!("HTTP server error: {}", e);
            }
        });

        Ok(Self {
            platform,
            link_order,
            config: app_cfg,
            local_addr,
            shutdown,
            http_task,
        })
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for the server to stop after shutdown has been triggered, giving
    /// in-flight requests up to `server.shutdown_timeout` seconds.
    pub async fn wait(self) {
        info!("⏳ Waiting for in-flight requests...");
        let timeout = std::time::Duration::from_secs(self.shutdown.timeout_secs());
        let abort = self.http_task.abort_handle();

        match tokio::time::timeout(timeout, self.http_task).await {
            Ok(Ok(())) => info!("HTTP server stopped"),
            Ok(Err(e)) => error!("HTTP server task panicked: {}", e),
            Err(_) => {
                warn!("⚠️ Graceful shutdown timed out after {}s", timeout.as_secs());
                abort.abort();
            }
        }

        info!("👋 Link Order storefront shutdown complete");
    }

    pub async fn shutdown(self) {
        info!("🛑 Shutting down Link Order storefront...");
        self.trigger_shutdown();
        self.wait().await;
    }

    pub fn is_running(&self) -> bool {
        !self.http_task.is_finished()
    }
}

/// Initialize tracing from the logging config.
///
/// `RUST_LOG` takes precedence over `logging.level`. Call once at startup.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match config.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProductSeed;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.server.host = "127.0.0.1".into();
        config.server.port = 0;
        config.server.shutdown_timeout = 5;
        config.link_order.article_and_prices = "XYZ=5,00=false".into();
        config.catalog.push(ProductSeed {
            id: None,
            product_number: "XYZ".into(),
            name: "Espresso Beans".into(),
        });
        config
    }

    #[tokio::test]
    async fn starts_seeded_and_shuts_down() {
        let handle = ServerHandle::start(ServerOptions {
            config: test_config(),
            install_metrics_recorder: false,
        })
        .await
        .expect("server start");

        assert_ne!(handle.local_addr.port(), 0);
        assert!(handle.is_running());
        assert_eq!(handle.platform.catalog.len(), 1);
        assert_eq!(handle.link_order.raw_rules().await, "XYZ=5,00=false");

        tokio::time::timeout(std::time::Duration::from_secs(5), handle.shutdown())
            .await
            .expect("shutdown timed out");
    }

    #[tokio::test]
    async fn rejects_invalid_config() {
        for target in ["checkout", "//evil.example"] {
            let mut config = test_config();
            config.link_order.redirect_target = target.into();
            let result = ServerHandle::start(ServerOptions {
                config,
                install_metrics_recorder: false,
            })
            .await;
            assert!(result.is_err(), "accepted {target}");
        }
    }
}
