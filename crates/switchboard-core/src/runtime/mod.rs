//! Hosted runtime - one embedded Lua VM behind a process-wide lock.
//!
//! All VM access goes through [`HostedRuntime::enter`], which returns an
//! [`ExclusiveSection`]. At most one section exists at a time; everything
//! else (tensor decoding, wire encoding) happens outside it.
//!
//! # Example
//! ```ignore
//! let runtime = HostedRuntime::with_config(&config)?;
//! let callables = runtime.load_script(source, "model")?;
//! ```
//!
//! # Releasing references
//! - a dropped `Callable` removes its registry entry right away when the VM
//!   is free
//! - otherwise the entry is queued and removed by the next `enter`

pub mod callable;
pub mod convert;
pub mod failure;
pub mod prelude;

use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mlua::{HookTriggers, Lua, RegistryKey, Value, VmState};
use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, warn};

pub use self::callable::Callable;
pub use self::failure::{FailureCategory, PendingFailure, RaisedFailure};

use crate::config::RuntimeConfig;
use crate::domain::Status;
use crate::error_map;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("lua error: {0}")]
    Lua(#[from] mlua::Error),

    #[error("script failed to load: {0}")]
    Load(mlua::Error),

    #[error("invalid script: {0}")]
    InvalidScript(String),

    #[error("value is not callable: {0}")]
    NotCallable(String),
}

impl From<RuntimeError> for Status {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Load(err) => error_map::load_status(&err),
            RuntimeError::Lua(err) => Status::internal(format!("lua runtime error: {err}")),
            other => Status::invalid_argument(other.to_string()),
        }
    }
}

pub struct HostedRuntime {
    lua: Mutex<Lua>,
    interrupt: Arc<AtomicBool>,
    /// Registry references dropped while the VM was busy; removed on the
    /// next `enter`.
    released: Mutex<Vec<RegistryKey>>,
}

/// Exclusive access to the VM. Released on drop.
pub struct ExclusiveSection<'a> {
    lua: MutexGuard<'a, Lua>,
}

impl Deref for ExclusiveSection<'_> {
    type Target = Lua;

    fn deref(&self) -> &Lua {
        &self.lua
    }
}

impl HostedRuntime {
    pub fn new() -> Result<Arc<Self>, RuntimeError> {
        Self::with_config(&RuntimeConfig::default())
    }

    pub fn with_config(config: &RuntimeConfig) -> Result<Arc<Self>, RuntimeError> {
        let lua = Lua::new();
        prelude::install(&lua)?;

        if let Some(limit) = config.memory_limit_bytes {
            lua.set_memory_limit(limit)?;
        }

        let interrupt = Arc::new(AtomicBool::new(false));
        if config.interrupt_check_instructions > 0 {
            let flag = Arc::clone(&interrupt);
            lua.set_hook(
                HookTriggers::new().every_nth_instruction(config.interrupt_check_instructions),
                move |_lua, _debug| {
                    if flag.swap(false, Ordering::SeqCst) {
                        return Err(RaisedFailure::new(
                            FailureCategory::Interrupted,
                            "execution interrupted",
                        )
                        .into_lua());
                    }
                    Ok(VmState::Continue)
                },
            );
        }

        debug!(
            memory_limit_bytes = ?config.memory_limit_bytes,
            interrupt_check_instructions = config.interrupt_check_instructions,
            "hosted runtime created"
        );
        Ok(Arc::new(Self {
            lua: Mutex::new(lua),
            interrupt,
            released: Mutex::new(Vec::new()),
        }))
    }

    /// Blocks until the VM is free. A pending interrupt left over from an
    /// earlier section is cleared.
    pub fn enter(&self) -> ExclusiveSection<'_> {
        let lua = self.lua.lock();
        self.interrupt.store(false, Ordering::SeqCst);
        remove_keys(&lua, std::mem::take(&mut *self.released.lock()));
        ExclusiveSection { lua }
    }

    /// Drops a registry reference without waiting for the VM. If another
    /// section holds it, the key is queued for the next `enter`.
    pub(crate) fn release(&self, key: RegistryKey) {
        match self.lua.try_lock() {
            Some(lua) => remove_keys(&lua, [key]),
            None => self.released.lock().push(key),
        }
    }

    /// References waiting for the VM to become free.
    pub fn pending_releases(&self) -> usize {
        self.released.lock().len()
    }

    /// Asks the callable currently running to stop. It fails with an
    /// `interrupted` failure at its next instruction check.
    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::SeqCst);
    }

    /// Evaluates `source`, which must produce a function, and keeps a
    /// reference to it.
    pub fn compile(self: &Arc<Self>, source: &str) -> Result<Callable, RuntimeError> {
        let key = {
            let lua = self.enter();
            match lua
                .load(source)
                .set_name("=compile")
                .eval::<Value>()
                .map_err(RuntimeError::Load)?
            {
                Value::Function(function) => lua.create_registry_value(function)?,
                other => return Err(RuntimeError::NotCallable(other.type_name().to_string())),
            }
        };
        Ok(Callable::from_key(Arc::clone(self), key))
    }

    /// Evaluates a chunk returning a table of functions. Returns one callable
    /// per string-keyed function, sorted by name; other entries are skipped.
    pub fn load_script(
        self: &Arc<Self>,
        source: &str,
        chunk_name: &str,
    ) -> Result<Vec<(String, Callable)>, RuntimeError> {
        let mut keys: Vec<(String, RegistryKey)> = Vec::new();
        {
            let lua = self.enter();
            let exports = match lua
                .load(source)
                .set_name(format!("={chunk_name}"))
                .eval::<Value>()
                .map_err(RuntimeError::Load)?
            {
                Value::Table(table) => table,
                other => {
                    return Err(RuntimeError::InvalidScript(format!(
                        "chunk '{chunk_name}' must return a table of functions, got {}",
                        other.type_name()
                    )));
                }
            };
            for pair in exports.pairs::<Value, Value>() {
                let (name, value) = pair?;
                let (Value::String(name), Value::Function(function)) = (name, value) else {
                    continue;
                };
                let name = String::from(&*name.to_str()?);
                keys.push((name, lua.create_registry_value(function)?));
            }
        }
        keys.sort_by(|a, b| a.0.cmp(&b.0));
        debug!(chunk = chunk_name, functions = keys.len(), "script loaded");
        Ok(keys
            .into_iter()
            .map(|(name, key)| (name, Callable::from_key(Arc::clone(self), key)))
            .collect())
    }
}

fn remove_keys(lua: &Lua, keys: impl IntoIterator<Item = RegistryKey>) {
    for key in keys {
        if let Err(err) = lua.remove_registry_value(key) {
            warn!(error = %err, "failed to release callable reference");
        }
    }
}
