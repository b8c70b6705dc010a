use crate::domain::{DomainError, DomainResult};
use std::fmt;
use std::sync::Arc;

/// Environment variable the IoT Edge runtime sets to the running module's ID
pub const MODULE_ID_ENV_VAR: &str = "IOTEDGE_MODULEID";

/// Process-wide module identity, read once at startup and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleIdentity {
    module_id: Arc<str>,
}

impl ModuleIdentity {
    pub fn new(module_id: impl AsRef<str>) -> DomainResult<Self> {
        let module_id = module_id.as_ref().trim();
        if module_id.is_empty() {
            return Err(DomainError::InvalidConfig(
                "module ID cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            module_id: Arc::from(module_id),
        })
    }

    /// Read the identity from `IOTEDGE_MODULEID`. A missing value is a fatal startup error.
    pub fn from_env() -> DomainResult<Self> {
        let module_id = std::env::var(MODULE_ID_ENV_VAR).map_err(|_| {
            DomainError::InvalidConfig(format!("{} is not set", MODULE_ID_ENV_VAR))
        })?;
        Self::new(module_id)
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.module_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_new_trims_value() {
        let identity = ModuleIdentity::new("  ptm  ").unwrap();
        assert_eq!(identity.module_id(), "ptm");
    }

    #[test]
    fn test_new_rejects_empty() {
        assert!(matches!(
            ModuleIdentity::new(""),
            Err(DomainError::InvalidConfig(_))
        ));
        assert!(ModuleIdentity::new("   ").is_err());
    }

    #[test]
    fn test_from_env() {
        let _lock = ENV_LOCK.lock().unwrap();

        // SAFETY: Test runs with mutex lock to prevent concurrent env access
        unsafe {
            std::env::set_var(MODULE_ID_ENV_VAR, "ptm-module");
        }
        let identity = ModuleIdentity::from_env().unwrap();
        assert_eq!(identity.to_string(), "ptm-module");

        // SAFETY: Test runs with mutex lock to prevent concurrent env access
        unsafe {
            std::env::remove_var(MODULE_ID_ENV_VAR);
        }
        assert!(matches!(
            ModuleIdentity::from_env(),
            Err(DomainError::InvalidConfig(msg)) if msg.contains(MODULE_ID_ENV_VAR)
        ));
    }
}
