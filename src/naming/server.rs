use super::protocol::{RegistrationApi, ServiceApi};
use super::service::NamingService;
use crate::config::NamingConfig;
use crate::rpc::{ServerHooks, SetupError, Skeleton, Stub};

use std::net::SocketAddr;
use std::sync::Arc;

/// The naming server: one `NamingService` behind a service skeleton and a registration
/// skeleton.
///
/// Once stopped, a naming server cannot be restarted.
pub struct NamingServer {
    service: Arc<NamingService>,
    service_skeleton: Skeleton<ServiceApi, NamingService>,
    registration_skeleton: Skeleton<RegistrationApi, NamingService>,
}

impl NamingServer {
    pub fn new(config: &NamingConfig) -> Result<Self, SetupError> {
        Self::with_service(config, Arc::new(NamingService::new()))
    }

    /// Serves an existing `NamingService`, e.g. one with a custom placement strategy.
    pub fn with_service(
        config: &NamingConfig,
        service: Arc<NamingService>,
    ) -> Result<Self, SetupError> {
        let service_skeleton =
            Skeleton::<ServiceApi, _>::with_address(service.clone(), config.service_addr)?
                .with_hooks(ServerHooks {
                    server: "Naming service",
                });
        let registration_skeleton =
            Skeleton::<RegistrationApi, _>::with_address(service.clone(), config.registration_addr)?
                .with_hooks(ServerHooks {
                    server: "Naming registration",
                });

        Ok(Self {
            service,
            service_skeleton,
            registration_skeleton,
        })
    }

    /// Starts both interfaces. If the second one fails to start, the first is stopped.
    pub async fn start(&self) -> Result<(), SetupError> {
        let service_addr = self.service_skeleton.start().await?;

        match self.registration_skeleton.start().await {
            Ok(registration_addr) => {
                tracing::info!(
                    "Naming server started (service {}, registration {})",
                    service_addr,
                    registration_addr
                );
                Ok(())
            }
            Err(e) => {
                self.service_skeleton.stop().await;
                Err(e)
            }
        }
    }

    pub async fn stop(&self) {
        self.service_skeleton.stop().await;
        self.registration_skeleton.stop().await;
    }

    pub fn service(&self) -> &Arc<NamingService> {
        &self.service
    }

    pub fn service_addr(&self) -> Option<SocketAddr> {
        self.service_skeleton.address()
    }

    pub fn registration_addr(&self) -> Option<SocketAddr> {
        self.registration_skeleton.address()
    }

    pub fn service_stub(&self) -> Result<Stub<ServiceApi>, SetupError> {
        Stub::for_skeleton(&self.service_skeleton)
    }

    pub fn registration_stub(&self) -> Result<Stub<RegistrationApi>, SetupError> {
        Stub::for_skeleton(&self.registration_skeleton)
    }
}
