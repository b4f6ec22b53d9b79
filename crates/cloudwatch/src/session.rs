use std::{
    collections::HashMap,
    sync::Arc,
};

use anyhow::Context;
use async_trait::async_trait;
use aws_utils::DEFAULT_PROFILE;
use tokio::sync::Mutex;

use crate::{
    metrics::{
        log_session_count,
        session_create_timer,
    },
    MetricDataInput,
    MetricDataOutput,
};

/// An authenticated CloudWatch client bound to one profile and region.
#[async_trait]
pub trait CloudWatchApi: Send + Sync {
    async fn get_metric_data(&self, input: MetricDataInput) -> anyhow::Result<MetricDataOutput>;
}

/// Creates sessions for the [`SessionCache`].
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn new_session(
        &self,
        profile: &str,
        region: &str,
    ) -> anyhow::Result<Arc<dyn CloudWatchApi>>;
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SessionKey {
    /// The default credential chain.
    Default { region: String },
    /// A named shared-config profile.
    Named { profile: String, region: String },
}

impl SessionKey {
    pub fn new(profile: &str, region: &str) -> Self {
        if profile == DEFAULT_PROFILE {
            Self::Default {
                region: region.to_owned(),
            }
        } else {
            Self::Named {
                profile: profile.to_owned(),
                region: region.to_owned(),
            }
        }
    }
}

/// Lazily created sessions, at most one per (profile, region).
///
/// Lookup and creation happen under a single lock, so concurrent callers for
/// a new key wait for the first one to finish creating it. Creation failures
/// are not remembered.
pub struct SessionCache {
    provider: Arc<dyn SessionProvider>,
    sessions: Mutex<HashMap<SessionKey, Arc<dyn CloudWatchApi>>>,
}

impl SessionCache {
    pub fn new(provider: Arc<dyn SessionProvider>) -> Self {
        Self {
            provider,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_session(
        &self,
        profile: &str,
        region: &str,
    ) -> anyhow::Result<Arc<dyn CloudWatchApi>> {
        let key = SessionKey::new(profile, region);
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get(&key) {
            return Ok(session.clone());
        }

        let timer = session_create_timer();
        let session = self
            .provider
            .new_session(profile, region)
            .await
            .with_context(|| {
                format!("Failed to create CloudWatch session for profile {profile:?} in {region}")
            })?;
        timer.finish();
        tracing::info!("Created CloudWatch session {key:?}");

        sessions.insert(key, session.clone());
        log_session_count(sessions.len());
        Ok(session)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
