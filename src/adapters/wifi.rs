//! WiFi station-mode adapter.
//!
//! Implements [`ConnectivityPort`], the hexagonal boundary for network
//! connectivity.  Connection is poll-driven from the run loop so a dead
//! access point never blocks the pump countdown.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: non-blocking `EspWifi` driver calls.
//! - **all other targets**: simulation stubs for host-side tests.
//!
//! ## Reconnection policy
//!
//! On disconnect (or a connect attempt that does not come up within
//! 15 s) the adapter waits an exponential backoff (2 s → 4 s → 8 s …
//! capped at 60 s) before retrying.

use core::fmt;
use log::{info, warn};

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};

// ───────────────────────────────────────────────────────────────
// Port trait
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
        }
    }
}

impl std::error::Error for ConnectivityError {}

impl From<ConnectivityError> for crate::error::Error {
    fn from(_: ConnectivityError) -> Self {
        Self::Comms(crate::error::CommsError::WifiConnectFailed)
    }
}

pub trait ConnectivityPort {
    /// Start connecting.  Completion is observed through [`poll`](Self::poll).
    fn connect(&mut self, now_ms: u64) -> Result<(), ConnectivityError>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
    /// Drive the state machine.  Call once per loop iteration.
    fn poll(&mut self, now_ms: u64);
    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError>;
}

// ───────────────────────────────────────────────────────────────
// Connection state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Connecting { since_ms: u64 },
    Connected,
    Reconnecting { attempt: u32, retry_at_ms: u64 },
}

const MIN_BACKOFF_MS: u64 = 2_000;
const MAX_BACKOFF_MS: u64 = 60_000;
const CONNECT_TIMEOUT_MS: u64 = 15_000;

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !ssid.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if !password.is_empty() && !(8..=64).contains(&password.len()) {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    state: WifiState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    backoff_ms: u64,
    #[cfg(target_os = "espidf")]
    driver: EspWifi<'static>,
    /// Simulation: link-layer state, toggled by tests.
    #[cfg(not(target_os = "espidf"))]
    sim_link_up: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_fail_next: u32,
}

impl WifiAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(driver: EspWifi<'static>) -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            backoff_ms: MIN_BACKOFF_MS,
            driver,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            backoff_ms: MIN_BACKOFF_MS,
            sim_link_up: false,
            sim_fail_next: 0,
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    /// Schedule the next retry and grow the backoff.
    fn back_off(&mut self, attempt: u32, now_ms: u64) {
        warn!("WiFi: retry {} in {} ms", attempt + 1, self.backoff_ms);
        self.state = WifiState::Reconnecting {
            attempt,
            retry_at_ms: now_ms + self.backoff_ms,
        };
        self.backoff_ms = (self.backoff_ms * 2).min(MAX_BACKOFF_MS);
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        let conf = Configuration::Client(ClientConfiguration {
            ssid: self
                .ssid
                .as_str()
                .try_into()
                .map_err(|()| ConnectivityError::InvalidSsid)?,
            password: self
                .password
                .as_str()
                .try_into()
                .map_err(|()| ConnectivityError::InvalidPassword)?,
            auth_method: if self.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        });
        let fail = |e: esp_idf_svc::sys::EspError| {
            warn!("WiFi(espidf): {e}");
            ConnectivityError::ConnectionFailed
        };
        self.driver.set_configuration(&conf).map_err(fail)?;
        if !self.driver.is_started().map_err(fail)? {
            self.driver.start().map_err(fail)?;
        }
        self.driver.connect().map_err(fail)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        if self.sim_fail_next > 0 {
            self.sim_fail_next -= 1;
            warn!("WiFi(sim): simulated connect failure");
            return Err(ConnectivityError::ConnectionFailed);
        }
        self.sim_link_up = true;
        info!("WiFi(sim): associated with '{}'", self.ssid);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        if let Err(e) = self.driver.disconnect() {
            warn!("WiFi(espidf): disconnect: {e}");
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        self.sim_link_up = false;
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_up(&self) -> bool {
        self.driver.is_up().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_up(&self) -> bool {
        self.sim_link_up
    }

    /// Simulation: drop the link as if the AP vanished.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_drop_link(&mut self) {
        self.sim_link_up = false;
    }

    /// Simulation: make the next `n` connect attempts fail.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_fail_attempts(&mut self, n: u32) {
        self.sim_fail_next = n;
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// ConnectivityPort
// ───────────────────────────────────────────────────────────────

impl ConnectivityPort for WifiAdapter {
    fn connect(&mut self, now_ms: u64) -> Result<(), ConnectivityError> {
        if self.ssid.is_empty() {
            return Err(ConnectivityError::NoCredentials);
        }
        if self.state == WifiState::Connected {
            return Ok(());
        }
        info!("WiFi: connecting to '{}'", self.ssid);
        match self.platform_connect() {
            Ok(()) => {
                self.state = WifiState::Connecting { since_ms: now_ms };
                Ok(())
            }
            Err(e) => {
                self.back_off(0, now_ms);
                Err(e)
            }
        }
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        self.state = WifiState::Disconnected;
        self.backoff_ms = MIN_BACKOFF_MS;
        info!("WiFi: disconnected");
    }

    fn is_connected(&self) -> bool {
        self.state == WifiState::Connected
    }

    fn poll(&mut self, now_ms: u64) {
        match self.state {
            WifiState::Connecting { since_ms } => {
                if self.platform_is_up() {
                    self.state = WifiState::Connected;
                    self.backoff_ms = MIN_BACKOFF_MS;
                    info!("WiFi: connected to '{}'", self.ssid);
                } else if now_ms.saturating_sub(since_ms) >= CONNECT_TIMEOUT_MS {
                    warn!("WiFi: connect timed out");
                    self.back_off(0, now_ms);
                }
            }
            WifiState::Connected => {
                if !self.platform_is_up() {
                    warn!("WiFi: connection lost, entering reconnect");
                    self.back_off(0, now_ms);
                }
            }
            WifiState::Reconnecting {
                attempt,
                retry_at_ms,
            } if now_ms >= retry_at_ms => {
                info!("WiFi: reconnect attempt {}", attempt + 1);
                match self.platform_connect() {
                    Ok(()) => self.state = WifiState::Connecting { since_ms: now_ms },
                    Err(_) => self.back_off(attempt + 1, now_ms),
                }
            }
            WifiState::Reconnecting { .. } | WifiState::Disconnected => {}
        }
    }

    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.ssid.clear();
        self.ssid
            .push_str(ssid)
            .map_err(|()| ConnectivityError::InvalidSsid)?;
        self.password.clear();
        self.password
            .push_str(password)
            .map_err(|()| ConnectivityError::InvalidPassword)?;
        info!("WiFi: credentials set (SSID='{}')", self.ssid);
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
