use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::channel::Channel;
use crate::error::ServiceError;

/// A single endpoint's implementation. One impl per RPC, registered into an
/// [`EndpointTable`] by name rather than discovered via decorator, per
/// `spec.md` §9's re-architecture note.
#[async_trait::async_trait]
pub trait Handler: Send + Sync {
    async fn call(
        &self,
        channel: Arc<Channel>,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Value, ServiceError>;
}

#[async_trait::async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Arc<Channel>, Vec<Value>, Map<String, Value>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value, ServiceError>> + Send,
{
    async fn call(
        &self,
        channel: Arc<Channel>,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Value, ServiceError> {
        (self)(channel, args, kwargs).await
    }
}

struct Registration {
    handler: Arc<dyn Handler>,
    permissions: HashSet<String>,
    requires_unlocked: bool,
}

/// The static `endpoint_name -> handler` table, plus each endpoint's
/// allowed privilege groups (empty == unrestricted) and whether it refuses
/// while the shard is locked. Mirrors `ServerBase.__routes__`/
/// `__permissions__`, populated with an explicit call instead of the
/// source's `@Server.endpoint(...)` class decorator.
#[derive(Default)]
pub struct EndpointTable {
    routes: HashMap<String, Registration>,
}

impl EndpointTable {
    pub fn new() -> Self {
        EndpointTable::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: impl Handler + 'static,
        permissions: impl IntoIterator<Item = impl Into<String>>,
        requires_unlocked: bool,
    ) {
        self.routes.insert(
            name.into(),
            Registration {
                handler: Arc::new(handler),
                permissions: permissions.into_iter().map(Into::into).collect(),
                requires_unlocked,
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.routes.contains_key(name)
    }

    pub fn requires_unlocked(&self, name: &str) -> bool {
        self.routes.get(name).map(|r| r.requires_unlocked).unwrap_or(false)
    }

    /// Empty permission set means unrestricted, matching the source's
    /// `if not self.__permissions__[endpoint]: return`.
    pub fn is_permitted(&self, name: &str, group: Option<&str>) -> bool {
        match self.routes.get(name) {
            None => false,
            Some(reg) if reg.permissions.is_empty() => true,
            Some(reg) => group.map(|g| reg.permissions.contains(g)).unwrap_or(false),
        }
    }

    pub async fn dispatch(
        &self,
        name: &str,
        channel: Arc<Channel>,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Value, ServiceError> {
        let reg = self
            .routes
            .get(name)
            .ok_or_else(|| ServiceError::UnknownEndpoint(name.to_string()))?;
        reg.handler.call(channel, args, kwargs).await
    }
}
