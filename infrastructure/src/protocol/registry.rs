//! Session registry: one [`ProtocolSessionClient`] per (server, user).
//!
//! Owned by whoever wires the process together and passed by `Arc`; there is
//! no global instance. Clients are created on first use and live as long as
//! the registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::client::{BearerTokenSource, ProtocolSessionClient, RemoteServerSettings};
use super::error::{ProtocolError, Result};
use super::transport::SessionTransport;

type SessionKey = (String, Option<String>);

struct ServerEntry {
    settings: RemoteServerSettings,
    transport: Arc<dyn SessionTransport>,
}

pub struct SessionRegistry {
    servers: HashMap<String, ServerEntry>,
    credentials: Option<Arc<dyn BearerTokenSource>>,
    clients: Mutex<HashMap<SessionKey, Arc<ProtocolSessionClient>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            servers: HashMap::new(),
            credentials: None,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn BearerTokenSource>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Add a server. Names must be unique.
    pub fn add_server(
        &mut self,
        settings: RemoteServerSettings,
        transport: Arc<dyn SessionTransport>,
    ) -> Result<()> {
        if self.servers.contains_key(&settings.name) {
            return Err(ProtocolError::Config(format!(
                "duplicate remote server '{}'",
                settings.name
            )));
        }
        self.servers
            .insert(settings.name.clone(), ServerEntry { settings, transport });
        Ok(())
    }

    /// Configured server names, sorted.
    pub fn servers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.servers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The client for `server` and `user_id`, created on first use.
    pub fn client_for(
        &self,
        server: &str,
        user_id: Option<&str>,
    ) -> Result<Arc<ProtocolSessionClient>> {
        let entry = self
            .servers
            .get(server)
            .ok_or_else(|| ProtocolError::Config(format!("unknown remote server '{}'", server)))?;

        let key = (server.to_string(), user_id.map(str::to_string));
        let mut clients = self
            .clients
            .lock()
            .map_err(|_| ProtocolError::Transport("session registry lock poisoned".to_string()))?;

        let client = clients.entry(key).or_insert_with(|| {
            debug!(server, user = ?user_id, "Creating protocol session client");
            let mut client =
                ProtocolSessionClient::new(entry.settings.clone(), entry.transport.clone())
                    .for_user(user_id.map(str::to_string));
            if let Some(credentials) = &self.credentials {
                client = client.with_credentials(credentials.clone());
            }
            Arc::new(client)
        });
        Ok(client.clone())
    }

    pub fn session_count(&self) -> usize {
        self.clients.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::super::client::testing::ScriptedTransport;
    use super::*;

    fn registry() -> SessionRegistry {
        let mut registry = SessionRegistry::new();
        let transport = Arc::new(ScriptedTransport::new());
        registry
            .add_server(
                RemoteServerSettings::new("gmail", "https://n8n.example.com/mcp/gmail").unwrap(),
                transport.clone(),
            )
            .unwrap();
        registry
            .add_server(
                RemoteServerSettings::new("calendar", "https://n8n.example.com/mcp/cal").unwrap(),
                transport,
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_one_client_per_server_and_user() {
        let registry = registry();

        let a1 = registry.client_for("gmail", Some("alice")).unwrap();
        let a2 = registry.client_for("gmail", Some("alice")).unwrap();
        let b = registry.client_for("gmail", Some("bob")).unwrap();
        let cal = registry.client_for("calendar", Some("alice")).unwrap();

        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
        assert!(!Arc::ptr_eq(&a1, &cal));
        assert_eq!(registry.session_count(), 3);
    }

    #[test]
    fn test_unknown_and_duplicate_servers() {
        let mut registry = registry();
        assert!(matches!(
            registry.client_for("slack", None),
            Err(ProtocolError::Config(_))
        ));

        let err = registry
            .add_server(
                RemoteServerSettings::new("gmail", "https://other.example.com").unwrap(),
                Arc::new(ScriptedTransport::new()),
            )
            .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
        assert_eq!(registry.servers(), vec!["calendar", "gmail"]);
    }
}
