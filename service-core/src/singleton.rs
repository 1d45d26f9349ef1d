//! Process-wide single instances of stateful clients.
//!
//! Each concrete type gets at most one instance per registry. Construction is
//! serialized by an async mutex so concurrent first requests cannot both run
//! their initializer. Later requests get the stored instance and their
//! initializer is never called, so arguments captured by it are ignored: the
//! first construction wins.
//!
//! The lock only covers construction. Stored values are shared through `Arc`
//! and must be safe for concurrent use on their own.

use once_cell::sync::Lazy;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

type Instance = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
pub struct SingletonRegistry {
    instances: Mutex<HashMap<TypeId, Instance>>,
}

static GLOBAL: Lazy<SingletonRegistry> = Lazy::new(SingletonRegistry::default);

/// The registry shared by the whole process.
pub fn global() -> &'static SingletonRegistry {
    &GLOBAL
}

impl SingletonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the instance of `T`, building it with `init` if none exists.
    /// A failed `init` stores nothing.
    pub async fn get_or_try_init<T, F, Fut, E>(&self, init: F) -> Result<Arc<T>, E>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut instances = self.instances.lock().await;
        if let Some(existing) = instances.get(&TypeId::of::<T>()) {
            if let Ok(instance) = Arc::clone(existing).downcast::<T>() {
                return Ok(instance);
            }
        }

        let instance = Arc::new(init().await?);
        tracing::debug!(type_name = std::any::type_name::<T>(), "Singleton created");
        instances.insert(TypeId::of::<T>(), instance.clone() as Instance);
        Ok(instance)
    }

    pub async fn get_or_init<T, F, Fut>(&self, init: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        match self
            .get_or_try_init(|| async { Ok::<T, std::convert::Infallible>(init().await) })
            .await
        {
            Ok(instance) => instance,
            Err(never) => match never {},
        }
    }

    pub async fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let instances = self.instances.lock().await;
        instances
            .get(&TypeId::of::<T>())
            .and_then(|existing| Arc::clone(existing).downcast::<T>().ok())
    }

    /// Forget the instance of `T`; the next request builds a new one.
    pub async fn remove<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let mut instances = self.instances.lock().await;
        instances
            .remove(&TypeId::of::<T>())
            .and_then(|existing| existing.downcast::<T>().ok())
    }
}
