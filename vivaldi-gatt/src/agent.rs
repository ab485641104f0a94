//! Pairing agent
//!
//! The host stack calls into the agent whenever a remote device wants to
//! pair or use a service. Every request is answered by asking the local
//! operator through [`OperatorPrompt`]; nothing is remembered between
//! requests except the exit-on-release policy.
//!
//! Requests may wait on the operator indefinitely. Callers are expected to
//! run each one on its own task and keep dispatching GATT traffic meanwhile.
//! [`Agent::cancel`] ends every request that arrived before it, which then
//! resolves with [`GattError::Canceled`]. A request's arrival is its
//! [`Ticket`]; take it where the call is received, not where it runs, so a
//! Cancel delivered before the request task starts still reaches it.

use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::watch;
use vivaldi_proto::{AGENT_IFACE, GattError, ObjectPath, Variant};

use crate::dispatch::{MethodCall, Reply};
use crate::shutdown::Shutdown;

/// Largest passkey a six digit display can show
pub const PASSKEY_MAX: u32 = 999_999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentState {
    #[default]
    Idle,
    AwaitingAuthorizeService,
    AwaitingPinCode,
    AwaitingPasskey,
    AwaitingConfirmation,
    AwaitingAuthorization,
}

/// Question put to the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    AuthorizeService { device: ObjectPath, uuid: String },
    PinCode { device: ObjectPath },
    Passkey { device: ObjectPath },
    Confirmation { device: ObjectPath, passkey: u32 },
    Authorization { device: ObjectPath },
}

impl Prompt {
    pub fn device(&self) -> &ObjectPath {
        match self {
            Prompt::AuthorizeService { device, .. }
            | Prompt::PinCode { device }
            | Prompt::Passkey { device }
            | Prompt::Confirmation { device, .. }
            | Prompt::Authorization { device } => device,
        }
    }

    /// Whether the expected answer is yes/no rather than a code
    pub fn is_yes_no(&self) -> bool {
        !matches!(self, Prompt::PinCode { .. } | Prompt::Passkey { .. })
    }

    pub fn text(&self) -> String {
        match self {
            Prompt::AuthorizeService { uuid, .. } => {
                format!("Authorize connection ({uuid}) (yes/no): ")
            }
            Prompt::PinCode { .. } => "Enter PIN code: ".to_string(),
            Prompt::Passkey { .. } => "Enter passkey: ".to_string(),
            Prompt::Confirmation { passkey, .. } => {
                format!("Confirm passkey {passkey:06} (yes/no): ")
            }
            Prompt::Authorization { .. } => "Authorize? (yes/no): ".to_string(),
        }
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.device(), self.text())
    }
}

/// Source of operator decisions
///
/// `None` means the operator could not answer at all (input closed); it is
/// treated as a refusal.
#[async_trait]
pub trait OperatorPrompt: Send + Sync {
    async fn ask(&self, prompt: &Prompt) -> Option<String>;
}

/// Marks a remote device as trusted in the host stack
#[async_trait]
pub trait DeviceTrust: Send + Sync {
    async fn set_trusted(&self, device: &ObjectPath) -> Result<(), GattError>;
}

fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("yes")
}

/// Number of cancels seen when a request arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

pub struct Agent {
    operator: Arc<dyn OperatorPrompt>,
    trust: Arc<dyn DeviceTrust>,
    shutdown: Shutdown,
    exit_on_release: AtomicBool,
    /// requests waiting on the operator, oldest first
    waiting: Mutex<Vec<(u64, AgentState)>>,
    next_wait: AtomicU64,
    cancels: watch::Sender<u64>,
}

impl Agent {
    pub fn new(
        operator: Arc<dyn OperatorPrompt>,
        trust: Arc<dyn DeviceTrust>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            operator,
            trust,
            shutdown,
            exit_on_release: AtomicBool::new(true),
            waiting: Mutex::new(Vec::new()),
            next_wait: AtomicU64::new(0),
            cancels: watch::channel(0).0,
        }
    }

    pub fn set_exit_on_release(&self, exit: bool) {
        self.exit_on_release.store(exit, Ordering::SeqCst);
    }

    pub fn exit_on_release(&self) -> bool {
        self.exit_on_release.load(Ordering::SeqCst)
    }

    /// State of the newest request still waiting on the operator
    pub fn state(&self) -> AgentState {
        self.waiting
            .lock()
            .ok()
            .and_then(|waiting| waiting.last().map(|(_, state)| *state))
            .unwrap_or_default()
    }

    /// Every request waiting on the operator, oldest first
    pub fn outstanding(&self) -> Vec<AgentState> {
        self.waiting
            .lock()
            .map(|waiting| waiting.iter().map(|(_, state)| *state).collect())
            .unwrap_or_default()
    }

    /// Mark the arrival of a request; a later [`Agent::cancel`] ends it
    pub fn ticket(&self) -> Ticket {
        Ticket(*self.cancels.borrow())
    }

    fn push_waiting(&self, state: AgentState) -> u64 {
        let id = self.next_wait.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut waiting) = self.waiting.lock() {
            waiting.push((id, state));
        }
        id
    }

    fn pop_waiting(&self, id: u64) {
        if let Ok(mut waiting) = self.waiting.lock() {
            waiting.retain(|(other, _)| *other != id);
        }
    }

    /// Put `prompt` to the operator, giving up once a cancel newer than
    /// `ticket` has been seen
    async fn ask(
        &self,
        ticket: Ticket,
        awaiting: AgentState,
        prompt: Prompt,
    ) -> Result<String, GattError> {
        let id = self.push_waiting(awaiting);
        let mut cancels = self.cancels.subscribe();

        let answer = tokio::select! {
            biased;
            _ = cancels.wait_for(|seen| *seen != ticket.0) => {
                tracing::info!("{} request canceled", prompt.device());
                Err(GattError::Canceled)
            }
            answer = self.operator.ask(&prompt) => {
                answer.ok_or_else(|| GattError::Rejected("no answer from operator".to_string()))
            }
        };

        self.pop_waiting(id);
        answer
    }

    async fn confirm(
        &self,
        ticket: Ticket,
        awaiting: AgentState,
        prompt: Prompt,
        refusal: &str,
    ) -> Result<(), GattError> {
        let answer = self.ask(ticket, awaiting, prompt).await?;
        if is_yes(&answer) {
            Ok(())
        } else {
            Err(GattError::Rejected(refusal.to_string()))
        }
    }

    pub async fn authorize_service(
        &self,
        ticket: Ticket,
        device: &ObjectPath,
        uuid: &str,
    ) -> Result<(), GattError> {
        tracing::info!("AuthorizeService ({device}, {uuid})");
        let prompt = Prompt::AuthorizeService { device: device.clone(), uuid: uuid.to_string() };
        let awaiting = AgentState::AwaitingAuthorizeService;
        self.confirm(ticket, awaiting, prompt, "Connection rejected by user").await
    }

    pub async fn request_pin_code(
        &self,
        ticket: Ticket,
        device: &ObjectPath,
    ) -> Result<String, GattError> {
        tracing::info!("RequestPinCode ({device})");
        self.trust.set_trusted(device).await?;
        let prompt = Prompt::PinCode { device: device.clone() };
        let answer = self.ask(ticket, AgentState::AwaitingPinCode, prompt).await?;
        Ok(answer.trim().to_string())
    }

    pub async fn request_passkey(
        &self,
        ticket: Ticket,
        device: &ObjectPath,
    ) -> Result<u32, GattError> {
        tracing::info!("RequestPasskey ({device})");
        self.trust.set_trusted(device).await?;
        let prompt = Prompt::Passkey { device: device.clone() };
        let answer = self.ask(ticket, AgentState::AwaitingPasskey, prompt).await?;
        match answer.trim().parse::<u32>() {
            Ok(passkey) if passkey <= PASSKEY_MAX => Ok(passkey),
            _ => {
                tracing::warn!("malformed passkey {:?} for {device}", answer.trim());
                Err(GattError::Rejected("malformed passkey".to_string()))
            }
        }
    }

    pub async fn request_confirmation(
        &self,
        ticket: Ticket,
        device: &ObjectPath,
        passkey: u32,
    ) -> Result<(), GattError> {
        tracing::info!("RequestConfirmation ({device}, {passkey:06})");
        let prompt = Prompt::Confirmation { device: device.clone(), passkey };
        let awaiting = AgentState::AwaitingConfirmation;
        self.confirm(ticket, awaiting, prompt, "Passkey doesn't match").await?;
        self.trust.set_trusted(device).await
    }

    pub async fn request_authorization(
        &self,
        ticket: Ticket,
        device: &ObjectPath,
    ) -> Result<(), GattError> {
        tracing::info!("RequestAuthorization ({device})");
        let prompt = Prompt::Authorization { device: device.clone() };
        let awaiting = AgentState::AwaitingAuthorization;
        self.confirm(ticket, awaiting, prompt, "Pairing rejected").await
    }

    pub fn display_passkey(&self, device: &ObjectPath, passkey: u32, entered: u16) {
        tracing::info!("DisplayPasskey ({device}, {passkey:06} entered {entered})");
    }

    pub fn display_pin_code(&self, device: &ObjectPath, pin: &str) {
        tracing::info!("DisplayPinCode ({device}, {pin})");
    }

    /// The host stack revoked the agent
    pub fn release(&self) {
        tracing::info!("Release");
        if self.exit_on_release() {
            self.shutdown.trigger();
        }
    }

    /// The host stack retracted its outstanding requests
    pub fn cancel(&self) {
        tracing::info!("Cancel");
        self.cancels.send_modify(|seen| *seen = seen.wrapping_add(1));
    }

    /// Route an `org.bluez.Agent1` call arriving now
    pub async fn dispatch(&self, call: &MethodCall) -> Result<Reply, GattError> {
        self.dispatch_with(self.ticket(), call).await
    }

    /// Route an `org.bluez.Agent1` call that arrived when `ticket` was taken
    pub async fn dispatch_with(
        &self,
        ticket: Ticket,
        call: &MethodCall,
    ) -> Result<Reply, GattError> {
        if call.interface != AGENT_IFACE {
            return Err(GattError::unknown_method(&call.interface, &call.member));
        }
        let args = &call.args;
        match call.member.as_str() {
            "Release" => {
                self.release();
                Ok(Reply::Empty)
            }
            "Cancel" => {
                self.cancel();
                Ok(Reply::Empty)
            }
            "AuthorizeService" => {
                self.authorize_service(ticket, arg_path(args, 0)?, arg_str(args, 1)?).await?;
                Ok(Reply::Empty)
            }
            "RequestPinCode" => {
                let pin = self.request_pin_code(ticket, arg_path(args, 0)?).await?;
                Ok(Reply::Text(pin))
            }
            "RequestPasskey" => {
                let passkey = self.request_passkey(ticket, arg_path(args, 0)?).await?;
                Ok(Reply::Passkey(passkey))
            }
            "DisplayPasskey" => {
                let entered = arg_u32(args, 2)?.min(u16::MAX as u32) as u16;
                self.display_passkey(arg_path(args, 0)?, arg_u32(args, 1)?, entered);
                Ok(Reply::Empty)
            }
            "DisplayPinCode" => {
                self.display_pin_code(arg_path(args, 0)?, arg_str(args, 1)?);
                Ok(Reply::Empty)
            }
            "RequestConfirmation" => {
                self.request_confirmation(ticket, arg_path(args, 0)?, arg_u32(args, 1)?).await?;
                Ok(Reply::Empty)
            }
            "RequestAuthorization" => {
                self.request_authorization(ticket, arg_path(args, 0)?).await?;
                Ok(Reply::Empty)
            }
            other => Err(GattError::unknown_method(AGENT_IFACE, other)),
        }
    }
}

fn arg_path(args: &[Variant], i: usize) -> Result<&ObjectPath, GattError> {
    args.get(i).and_then(|v| v.as_path()).ok_or(GattError::InvalidArgs)
}

fn arg_str(args: &[Variant], i: usize) -> Result<&str, GattError> {
    args.get(i).and_then(|v| v.as_str()).ok_or(GattError::InvalidArgs)
}

fn arg_u32(args: &[Variant], i: usize) -> Result<u32, GattError> {
    args.get(i).and_then(|v| v.as_u32()).ok_or(GattError::InvalidArgs)
}
