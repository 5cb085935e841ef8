use async_trait::async_trait;
use ldap3::{ldap_escape, Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::LdapConfig;

/// External identity store consulted when the local password check fails
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// True only when the directory confirms the credentials. Failures of
    /// the directory itself are reported as `false`.
    async fn authenticate(&self, uid: &str, password: &str) -> bool;
}

/// Used when no directory service is configured
pub struct NoDirectory;

#[async_trait]
impl DirectoryService for NoDirectory {
    async fn authenticate(&self, _uid: &str, _password: &str) -> bool {
        false
    }
}

pub struct LdapDirectory {
    url: String,
    search_base: String,
    bind_dn: Option<String>,
    bind_password: Option<String>,
    uid_attribute: String,
    timeout: Duration,
}

impl LdapDirectory {
    /// Returns `None` when the config names no directory URL.
    pub fn from_config(config: &LdapConfig) -> Option<Self> {
        let url = config.url.clone()?;
        Some(Self {
            url,
            search_base: config.search_base.clone(),
            bind_dn: config.bind_dn.clone(),
            bind_password: config.bind_password.clone(),
            uid_attribute: config.uid_attribute.clone(),
            timeout: Duration::from_secs(5),
        })
    }

    fn user_filter(&self, uid: &str) -> String {
        format!("({}={})", self.uid_attribute, ldap_escape(uid))
    }

    async fn verify(&self, ldap: &mut Ldap, uid: &str, password: &str) -> Result<bool, LdapError> {
        if let Some(bind_dn) = &self.bind_dn {
            let bind_password = self.bind_password.as_deref().unwrap_or_default();
            ldap.simple_bind(bind_dn, bind_password).await?.success()?;
        }

        let (entries, _) = ldap
            .search(&self.search_base, Scope::Subtree, &self.user_filter(uid), vec!["1.1"])
            .await?
            .success()?;

        let Some(entry) = entries.into_iter().next() else {
            debug!("Directory has no entry for uid '{}'", uid);
            return Ok(false);
        };
        let dn = SearchEntry::construct(entry).dn;

        // rc 49 is invalidCredentials; anything else is a directory failure
        let result = ldap.simple_bind(&dn, password).await?;
        match result.rc {
            0 => Ok(true),
            49 => Ok(false),
            _ => result.success().map(|_| true),
        }
    }
}

#[async_trait]
impl DirectoryService for LdapDirectory {
    async fn authenticate(&self, uid: &str, password: &str) -> bool {
        // An empty password would be an unauthenticated bind, which servers accept.
        if uid.is_empty() || password.is_empty() {
            return false;
        }

        let settings = LdapConnSettings::new().set_conn_timeout(self.timeout);
        let (conn, mut ldap) = match LdapConnAsync::with_settings(settings, &self.url).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("Directory connection to {} failed: {}", self.url, e);
                return false;
            }
        };
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!("Directory connection error: {}", e);
            }
        });

        let outcome = self.verify(&mut ldap, uid, password).await;

        if let Err(e) = ldap.unbind().await {
            debug!("Directory unbind failed: {}", e);
        }

        match outcome {
            Ok(valid) => valid,
            Err(e) => {
                warn!("Directory authentication for uid '{}' failed: {}", uid, e);
                false
            }
        }
    }
}
