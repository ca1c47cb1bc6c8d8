//! A typed contacts client over a wirelink session.
//!
//! This is the domain layer the engine was designed to stay out of: it only
//! builds parameter objects, decodes typed results, and maps push events to
//! an enum. Everything about framing, correlation and timeouts lives in
//! `wirelink`.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use wirelink::{CallError, RpcSession};

pub const METHOD_CONTACTS_GET: &str = "contacts.get";
pub const METHOD_CONTACT_SET: &str = "contact.set";
pub const METHOD_CONTACT_DELETE: &str = "contact.delete";

pub const EVENT_CONTACTS_UPDATED: &str = "contacts.updated";
pub const EVENT_CONTACTS_DELETED: &str = "contacts.deleted";

/// Per-command timeout the original service client used.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Server acknowledgement for a contact update.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateConfirmation {
    pub id: String,
}

/// Server acknowledgement for a contact deletion.
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteConfirmation {
    pub id: Vec<String>,
}

/// Push events the contacts service emits.
#[derive(Debug, Clone, PartialEq)]
pub enum ContactsEvent {
    Updated(Value),
    Deleted(Value),
}

impl ContactsEvent {
    /// Map a raw `(name, params)` push to a contacts event, if it is one.
    pub fn from_push(name: &str, params: &Value) -> Option<Self> {
        match name {
            EVENT_CONTACTS_UPDATED => Some(Self::Updated(params.clone())),
            EVENT_CONTACTS_DELETED => Some(Self::Deleted(params.clone())),
            _ => None,
        }
    }
}

pub struct ContactsClient {
    session: Arc<RpcSession>,
}

impl ContactsClient {
    pub fn new(session: Arc<RpcSession>) -> Self {
        Self { session }
    }

    pub async fn get_contacts(&self) -> Result<Vec<Contact>, CallError> {
        let request = self.session.create_request(METHOD_CONTACTS_GET, json!({}));
        self.session.call(request, COMMAND_TIMEOUT).await
    }

    pub async fn update_contact(&self, contact: &Contact) -> Result<UpdateConfirmation, CallError> {
        let params = serde_json::to_value(contact).map_err(CallError::Serialize)?;
        let request = self.session.create_request(METHOD_CONTACT_SET, params);
        self.session.call(request, COMMAND_TIMEOUT).await
    }

    pub async fn delete_contact(&self, contact_id: &str) -> Result<DeleteConfirmation, CallError> {
        let request = self
            .session
            .create_request(METHOD_CONTACT_DELETE, json!({"id": [contact_id]}));
        self.session.call(request, COMMAND_TIMEOUT).await
    }

    /// Subscribe to contact pushes. Non-contact events are ignored.
    pub fn on_contacts_event<F>(&self, f: F)
    where
        F: Fn(ContactsEvent) + Send + Sync + 'static,
    {
        self.session.on_event(move |name, params| {
            match ContactsEvent::from_push(name, params) {
                Some(event) => f(event),
                None => tracing::debug!(event = %name, "ignoring non-contacts push"),
            }
        });
    }
}
