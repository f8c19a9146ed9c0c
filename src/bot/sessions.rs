//! Per-user model client registry.
//!
//! Each user chats through a provider client bound to their own API
//! token. Tokens are validated before they are accepted, then mirrored
//! to the credential store so the registry survives restarts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{error, info, warn};

use crate::bot::error::BotError;
use crate::llm::CompletionProvider;
use crate::storage::{CredentialMap, CredentialStore};

/// Builds provider clients from raw API keys.
#[cfg_attr(test, mockall::automock)]
pub trait ProviderFactory: Send + Sync {
    /// Creates a provider bound to the given API key.
    fn create(&self, api_key: &str) -> Arc<dyn CompletionProvider>;
}

/// Factory producing real OpenAI-backed clients.
pub struct OpenAiFactory;

impl ProviderFactory for OpenAiFactory {
    fn create(&self, api_key: &str) -> Arc<dyn CompletionProvider> {
        Arc::new(crate::llm::openai::OpenAiProvider::new(api_key))
    }
}

/// Credential-backed registry of per-user provider clients.
pub struct SessionRegistry {
    clients: Mutex<HashMap<String, Arc<dyn CompletionProvider>>>,
    factory: Arc<dyn ProviderFactory>,
    store: Arc<dyn CredentialStore>,
    default_token: Option<String>,
}

impl SessionRegistry {
    /// Creates a registry; an empty default token counts as absent.
    #[must_use]
    pub fn new(
        factory: Arc<dyn ProviderFactory>,
        store: Arc<dyn CredentialStore>,
        default_token: Option<String>,
    ) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            factory,
            store,
            default_token: default_token.filter(|token| !token.is_empty()),
        }
    }

    fn lock_clients(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn CompletionProvider>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs clients for already-persisted credentials, without
    /// re-validating them against the provider.
    pub fn preload(&self, credentials: &CredentialMap) {
        let mut clients = self.lock_clients();
        for (user_id, api_key) in credentials {
            clients.insert(user_id.clone(), self.factory.create(api_key));
        }
    }

    /// Validates and registers a user-submitted token.
    ///
    /// # Errors
    ///
    /// `InvalidCredential` when the provider rejects the token; the
    /// registry and store are left untouched in that case.
    pub async fn setup_token(&self, user_id: &str, api_key: &str) -> Result<(), BotError> {
        self.install(user_id, api_key).await.map(|_| ())
    }

    /// Returns the user's client, bootstrapping one from the default
    /// token on first contact.
    ///
    /// # Errors
    ///
    /// `MissingCredential` when the user has no client and no default
    /// token is configured.
    pub async fn get_or_init(&self, user_id: &str) -> Result<Arc<dyn CompletionProvider>, BotError> {
        if let Some(client) = self.lock_clients().get(user_id) {
            return Ok(Arc::clone(client));
        }
        let Some(default) = self.default_token.clone() else {
            error!("No default API token configured");
            return Err(BotError::MissingCredential);
        };
        self.install(user_id, &default).await
    }

    async fn install(
        &self,
        user_id: &str,
        api_key: &str,
    ) -> Result<Arc<dyn CompletionProvider>, BotError> {
        let client = self.factory.create(api_key);
        if let Err(e) = client.validate_credential().await {
            warn!("Token validation failed for {user_id}: {e}");
            return Err(BotError::InvalidCredential);
        }
        self.lock_clients()
            .insert(user_id.to_string(), Arc::clone(&client));

        let mut entry = CredentialMap::new();
        entry.insert(user_id.to_string(), api_key.to_string());
        self.store.save(&entry).await?;
        info!("Registered API token for {user_id}");
        Ok(client)
    }
}
