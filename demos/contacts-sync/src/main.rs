//! Contacts demo: a typed client talking to a scripted in-process peer over
//! an in-memory transport pair.

use std::sync::Arc;

use anyhow::{Context, Result};
use contacts_sync::{Contact, ContactsClient, ContactsEvent};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;
use wirelink::{RpcSession, Transport, PROTOCOL_VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let (client_transport, server_transport) = Transport::mem_pair();

    tokio::spawn(contacts_peer(server_transport));

    let session = Arc::new(RpcSession::new(client_transport));
    tokio::spawn(session.clone().run());

    let client = ContactsClient::new(session.clone());
    client.on_contacts_event(|event| match event {
        ContactsEvent::Updated(params) => tracing::info!(?params, "contacts updated push"),
        ContactsEvent::Deleted(params) => tracing::info!(?params, "contacts deleted push"),
    });

    let contacts = client.get_contacts().await?;
    tracing::info!(count = contacts.len(), "fetched contacts");
    for contact in &contacts {
        tracing::info!(id = %contact.id, name = %contact.first_name, "contact");
    }

    let mut updated = contacts
        .first()
        .cloned()
        .context("peer returned no contacts")?;
    updated.job_title = Some("Chief Calculator".into());
    let confirmation = client.update_contact(&updated).await?;
    tracing::info!(id = %confirmation.id, "contact updated");

    let doomed = contacts
        .get(1)
        .context("peer returned fewer than two contacts")?;
    let deleted = client.delete_contact(&doomed.id).await?;
    tracing::info!(ids = ?deleted.id, "contact deleted");

    // Give the peer's final push a moment to arrive before shutting down.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    session.close();
    Ok(())
}

/// Scripted contacts service: answers the three commands and pushes an
/// update event after every mutation.
async fn contacts_peer(transport: Transport) {
    let roster = vec![
        Contact {
            id: "c1".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            image_url: None,
            company: Some("Analytical Engines Ltd".into()),
            job_title: None,
            phone_number: None,
            email: Some("ada@example.com".into()),
        },
        Contact {
            id: "c2".into(),
            first_name: "Charles".into(),
            last_name: "Babbage".into(),
            image_url: None,
            company: Some("Analytical Engines Ltd".into()),
            job_title: Some("Founder".into()),
            phone_number: None,
            email: None,
        },
    ];

    while let Ok(frame) = transport.recv().await {
        if frame.first() != Some(&PROTOCOL_VERSION) {
            continue;
        }
        let Ok(request) = serde_json::from_slice::<Value>(&frame[1..]) else {
            continue;
        };
        let id = request["id"].clone();
        let reply = match request["method"].as_str() {
            Some("contacts.get") => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": &roster,
            }),
            Some("contact.set") => {
                push(&transport, "contacts.updated", json!([request["params"]["id"]])).await;
                json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": {"id": request["params"]["id"]},
                })
            }
            Some("contact.delete") => {
                push(&transport, "contacts.deleted", request["params"]["id"].clone()).await;
                json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": {"id": request["params"]["id"]},
                })
            }
            _ => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32601, "message": "Method not found"},
            }),
        };
        if send(&transport, &reply).await.is_err() {
            break;
        }
    }
}

async fn push(transport: &Transport, method: &str, params: Value) {
    let _ = send(
        transport,
        &json!({"jsonrpc": "2.0", "method": method, "params": params}),
    )
    .await;
}

async fn send(transport: &Transport, body: &Value) -> Result<()> {
    let mut frame = vec![PROTOCOL_VERSION];
    frame.extend_from_slice(&serde_json::to_vec(body)?);
    transport.send(frame).await?;
    Ok(())
}
