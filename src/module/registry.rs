// Copyright 2020 Contributors to the Parsec project.
// SPDX-License-Identifier: Apache-2.0
use super::{FunctionList, NativeLoader};
use crate::error::{Error, Result};
use crate::identifier::ModuleId;
use cryptoki_sys::CKR_CRYPTOKI_ALREADY_INITIALIZED;
use derivative::Derivative;
use log::{info, trace};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Source of module function tables
pub trait LoadModule: Send + Sync {
    /// Load the library at the module path and resolve its function table, without
    /// initializing it.
    fn load(&self, module: &ModuleId) -> Result<Arc<dyn FunctionList>>;
}

/// Process-wide cache of initialized modules
///
/// A module path is loaded and initialized at most once per process, paths being compared
/// without regard to ASCII case. Entries are never evicted.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ModuleRegistry {
    #[derivative(Debug = "ignore")]
    loader: Box<dyn LoadModule>,
    #[derivative(Debug = "ignore")]
    modules: Mutex<HashMap<ModuleId, Arc<dyn FunctionList>>>,
}

impl ModuleRegistry {
    /// Registry loading shared libraries from disk
    pub fn new() -> ModuleRegistry {
        ModuleRegistry::with_loader(Box::new(NativeLoader))
    }

    /// Registry using another source of function tables
    pub fn with_loader(loader: Box<dyn LoadModule>) -> ModuleRegistry {
        ModuleRegistry {
            loader,
            modules: Mutex::new(HashMap::new()),
        }
    }

    /// Return the initialized function table of a module, loading and initializing it on
    /// first use.
    ///
    /// # Errors
    ///
    /// Load failures are returned as is. An initialization failure other than "already
    /// initialized" gives `ModuleInit`. Nothing is cached on failure.
    pub fn load(&self, module: &ModuleId) -> Result<Arc<dyn FunctionList>> {
        // Loading and initializing under the lock keeps concurrent first uses of the same
        // path from initializing it twice.
        let mut modules = self.modules.lock().expect("Module registry lock poisoned");
        if let Some(functions) = modules.get(module) {
            return Ok(functions.clone());
        }

        info!("Loading PKCS 11 library '{}'", module);
        let functions = self.loader.load(module)?;

        trace!("Initialize command");
        match functions.initialize() {
            Ok(()) => (),
            Err(rv) if rv == CKR_CRYPTOKI_ALREADY_INITIALIZED => {
                info!("PKCS 11 library '{}' was already initialized.", module)
            }
            Err(rv) => {
                format_error!("Error initializing the PKCS 11 library", rv);
                return Err(Error::ModuleInit {
                    path: module.to_string(),
                    rv,
                });
            }
        }

        let _ = modules.insert(module.clone(), functions.clone());
        Ok(functions)
    }

    /// Whether a module path already has an initialized entry
    pub fn contains(&self, module: &ModuleId) -> bool {
        self.modules
            .lock()
            .expect("Module registry lock poisoned")
            .contains_key(module)
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        ModuleRegistry::new()
    }
}
