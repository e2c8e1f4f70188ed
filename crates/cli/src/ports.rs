//! Console-backed implementations of the client's ports.
//!
//! The CLI has no persistent UI, so session notifications become log events
//! and the stored credential lives only for the process lifetime.

use std::sync::{Mutex, PoisonError};

use inference::{
    AccountId, ApiKey, CredentialStore, LoginTicket, ModelName, SessionSink, SettingsStore,
    Temperature,
};
use serde_json::Value;
use tracing::{error, info};

pub struct ProcessCredentials {
    api_key: Mutex<ApiKey>,
    fine_tune: Mutex<Option<Value>>,
}

impl ProcessCredentials {
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            api_key: Mutex::new(api_key),
            fine_tune: Mutex::new(None),
        }
    }

    pub fn fine_tune(&self) -> Option<Value> {
        self.fine_tune
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CredentialStore for ProcessCredentials {
    fn api_key(&self) -> ApiKey {
        self.api_key
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update_api_key(&self, key: ApiKey) {
        *self.api_key.lock().unwrap_or_else(PoisonError::into_inner) = key;
        info!("api key updated");
    }

    fn update_fine_tune(&self, fine_tune: Option<Value>) {
        *self.fine_tune.lock().unwrap_or_else(PoisonError::into_inner) = fine_tune;
    }
}

pub struct CliSettings {
    pub model: Option<ModelName>,
    pub temperature: Option<Temperature>,
}

impl SettingsStore for CliSettings {
    fn model(&self) -> Option<ModelName> {
        self.model.clone()
    }

    fn temperature(&self) -> Option<Temperature> {
        self.temperature
    }
}

pub struct ConsoleSession {
    ticket: Option<LoginTicket>,
    account: Mutex<Option<AccountId>>,
}

impl ConsoleSession {
    pub fn new(ticket: Option<LoginTicket>) -> Self {
        Self {
            ticket,
            account: Mutex::new(None),
        }
    }
}

impl SessionSink for ConsoleSession {
    fn login_ticket(&self) -> Option<LoginTicket> {
        self.ticket.clone()
    }

    fn account(&self) -> Option<AccountId> {
        self.account
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn mark_logged_in(&self, account: AccountId) {
        *self.account.lock().unwrap_or_else(PoisonError::into_inner) = Some(account);
    }

    fn mark_logged_out(&self) {
        *self.account.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn set_guest_status(&self, guest: bool) {
        info!(guest, "status: guest");
    }

    fn set_error_status(&self, error: bool) {
        info!(error, "status: error");
    }

    fn show_error(&self, message: &str) {
        error!(%message, "login failed");
    }
}
