use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use vivaldi_gatt::advertisement::Advertisement;
use vivaldi_gatt::agent::{Agent, DeviceTrust, OperatorPrompt};
use vivaldi_gatt::{Application, MethodCall, Reply, Shutdown};
use vivaldi_proto::{AGENT_CAPABILITY, AGENT_PATH, GattError, ObjectPath, PathError};

use crate::backend::DeviceBackend;
use crate::config::PeripheralConfig;
use crate::host::{HostError, HostEvent, HostStack};
use crate::profile::{self, ProfileError};

#[derive(thiserror::Error, Debug)]
pub enum PeripheralError {
    #[error("no bluetooth adapter offers GATT")]
    NoAdapter,
    #[error("failed to register {what}: {source}")]
    Registration {
        what: &'static str,
        source: HostError,
    },
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

/// Marks devices trusted through the host stack on behalf of the agent
struct HostTrust(Arc<dyn HostStack>);

#[async_trait]
impl DeviceTrust for HostTrust {
    async fn set_trusted(&self, device: &ObjectPath) -> Result<(), GattError> {
        self.0
            .set_trusted(device)
            .await
            .map_err(|e| GattError::Failed(e.to_string()))
    }
}

/// Registrations the host stack has accepted so far
#[derive(Debug, Default)]
struct Registered {
    agent: bool,
    advertisement: bool,
    application: bool,
}

/// The GATT application, its advertisement and the pairing agent, served
/// from a single dispatch loop
pub struct Peripheral {
    host: Arc<dyn HostStack>,
    app: Application,
    advertisement: Advertisement,
    agent: Arc<Agent>,
    agent_path: ObjectPath,
    adapter: Option<ObjectPath>,
    shutdown: Shutdown,
}

impl Peripheral {
    pub fn new(
        host: Arc<dyn HostStack>,
        app: Application,
        advertisement: Advertisement,
        operator: Arc<dyn OperatorPrompt>,
        shutdown: Shutdown,
    ) -> Result<Self, PeripheralError> {
        let trust = Arc::new(HostTrust(host.clone()));
        Ok(Self {
            agent: Arc::new(Agent::new(operator, trust, shutdown.clone())),
            agent_path: ObjectPath::new(AGENT_PATH)?,
            host,
            app,
            advertisement,
            adapter: None,
            shutdown,
        })
    }

    /// Assemble the profile, advertisement and policies named in `config`
    pub fn from_config(
        config: &PeripheralConfig,
        host: Arc<dyn HostStack>,
        backend: Arc<dyn DeviceBackend>,
        operator: Arc<dyn OperatorPrompt>,
        shutdown: Shutdown,
    ) -> Result<Self, PeripheralError> {
        let app = profile::build_application(config.profile, backend)?;
        let advertisement = profile::test_advertisement(0, &config.local_name)?;
        let mut peripheral = Self::new(host, app, advertisement, operator, shutdown)?;
        if let Some(adapter) = &config.adapter {
            peripheral.adapter = Some(ObjectPath::new(adapter.as_str())?);
        }
        peripheral.agent.set_exit_on_release(config.exit_on_release);
        Ok(peripheral)
    }

    /// Use `adapter` instead of looking one up
    pub fn with_adapter(mut self, adapter: ObjectPath) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    pub fn application(&self) -> &Application {
        &self.app
    }

    pub fn advertisement(&self) -> &Advertisement {
        &self.advertisement
    }

    async fn register(
        &self,
        adapter: &ObjectPath,
        done: &mut Registered,
    ) -> Result<(), PeripheralError> {
        self.host.power_on(adapter).await?;
        self.host.register_agent(&self.agent_path, AGENT_CAPABILITY).await?;
        done.agent = true;

        self.host
            .register_advertisement(adapter, self.advertisement.path())
            .await
            .map_err(|source| PeripheralError::Registration { what: "advertisement", source })?;
        done.advertisement = true;
        tracing::info!("advertisement registered");

        tracing::info!("registering GATT application...");
        self.host
            .register_application(adapter, self.app.path())
            .await
            .map_err(|source| PeripheralError::Registration { what: "application", source })?;
        done.application = true;
        tracing::info!("GATT application registered");

        self.host.request_default_agent(&self.agent_path).await?;
        Ok(())
    }

    /// Withdraw whatever `register` got through, newest first
    async fn unregister(&self, adapter: &ObjectPath, done: &Registered) {
        if done.application {
            if let Err(e) = self.host.unregister_application(adapter, self.app.path()).await {
                tracing::warn!("failed to unregister GATT application: {e}");
            }
        }
        if done.advertisement {
            let advertisement = self.advertisement.path();
            if let Err(e) = self.host.unregister_advertisement(adapter, advertisement).await {
                tracing::warn!("failed to unregister advertisement: {e}");
            }
        }
        if done.agent {
            if let Err(e) = self.host.unregister_agent(&self.agent_path).await {
                tracing::warn!("failed to unregister agent: {e}");
            }
        }
    }

    /// Register with the host stack and serve `events` until shutdown
    ///
    /// Ends with an error when the host stack refuses a registration, and
    /// returns normally once the shutdown signal fires or `events` closes.
    /// Either way every accepted registration is withdrawn before returning.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<HostEvent>,
    ) -> Result<(), PeripheralError> {
        let adapter = match self.adapter.take() {
            Some(adapter) => adapter,
            None => self.host.find_adapter().await?.ok_or(PeripheralError::NoAdapter)?,
        };
        tracing::info!("using adapter {adapter}");

        let mut registered = Registered::default();
        if let Err(e) = self.register(&adapter, &mut registered).await {
            tracing::error!("{e}");
            self.unregister(&adapter, &registered).await;
            self.shutdown.trigger();
            return Err(e);
        }

        let mut signals = self.app.subscribe();
        let shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    tracing::info!("shutting down");
                    break;
                }
                Some(signal) = signals.recv() => {
                    if let Err(e) = self.host.emit_signal(signal).await {
                        tracing::warn!("failed to emit PropertiesChanged: {e}");
                    }
                }
                event = events.recv() => match event {
                    Some(HostEvent::Call { call, reply }) => self.handle_call(call, reply).await,
                    None => {
                        tracing::info!("host stack connection closed");
                        break;
                    }
                },
            }
        }

        while let Ok(signal) = signals.try_recv() {
            if let Err(e) = self.host.emit_signal(signal).await {
                tracing::warn!("failed to emit PropertiesChanged: {e}");
            }
        }
        self.unregister(&adapter, &registered).await;
        Ok(())
    }

    async fn handle_call(
        &mut self,
        call: MethodCall,
        reply: oneshot::Sender<Result<Reply, GattError>>,
    ) {
        tracing::debug!("{} {}.{}", call.path, call.interface, call.member);

        // agent requests may wait on the operator indefinitely
        if call.path == self.agent_path {
            let agent = self.agent.clone();
            let ticket = agent.ticket();
            tokio::spawn(async move {
                let result = agent.dispatch_with(ticket, &call).await;
                if reply.send(result).is_err() {
                    tracing::debug!("agent reply dropped: {}", call.member);
                }
            });
            return;
        }

        let result = if &call.path == self.advertisement.path() {
            self.advertisement.dispatch(&call)
        } else {
            self.app.dispatch(call).await
        };
        if let Err(e) = &result {
            tracing::debug!("call failed: {e} ({})", e.dbus_name());
        }
        if reply.send(result).is_err() {
            tracing::debug!("caller went away before the reply");
        }
    }
}
