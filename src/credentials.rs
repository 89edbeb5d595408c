//! Credential lifecycle
//!
//! The API key and device id are loaded once when the store is opened, replaced
//! only after a successful validation, and erased on operator request. The
//! persisted record is a fixed-size block: key bytes followed by id bytes. Any
//! record of a different size is treated as absent.

use cirrus_core_interface::KeyValueStore;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::error::{CloudError, Result};

/// Length of a cloud access token
pub const API_KEY_LEN: usize = 40;

/// Length of a device identifier
pub const DEVICE_ID_LEN: usize = 24;

/// Size of the persisted record
pub const RECORD_LEN: usize = API_KEY_LEN + DEVICE_ID_LEN;

/// Store namespace holding the credential record
pub const NAMESPACE: &str = "particle";

/// Key of the credential record inside [`NAMESPACE`]
pub const RECORD_KEY: &str = "PDATA";

/// API key and device id, either both set or both empty
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
    device_id: String,
}

impl Credentials {
    /// Build a credential pair, checking the fixed field lengths
    pub fn new(api_key: impl Into<String>, device_id: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        let device_id = device_id.into();
        check_len("API key", &api_key, API_KEY_LEN)?;
        check_len("device ID", &device_id, DEVICE_ID_LEN)?;
        Ok(Self { api_key, device_id })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.device_id.is_empty()
    }

    /// Token presence for display, never the token itself
    pub fn masked_api_key(&self) -> &'static str {
        if self.api_key.is_empty() {
            "<not set>"
        } else {
            "<configured>"
        }
    }

    fn to_record(&self) -> Vec<u8> {
        let mut record = Vec::with_capacity(RECORD_LEN);
        record.extend_from_slice(self.api_key.as_bytes());
        record.extend_from_slice(self.device_id.as_bytes());
        record
    }

    fn from_record(record: &[u8]) -> Option<Self> {
        if record.len() != RECORD_LEN {
            return None;
        }
        let (key, id) = record.split_at(API_KEY_LEN);
        let api_key = std::str::from_utf8(key).ok()?;
        let device_id = std::str::from_utf8(id).ok()?;
        Self::new(api_key, device_id).ok()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.masked_api_key())
            .field("device_id", &self.device_id)
            .finish()
    }
}

fn check_len(field: &'static str, value: &str, expected: usize) -> Result<()> {
    if value.len() != expected {
        return Err(CloudError::CredentialLength {
            field,
            expected,
            actual: value.len(),
        });
    }
    Ok(())
}

/// Owner of the current credentials and their persistence
///
/// Readers always get a complete copy taken under the lock, so a concurrent
/// `save` is observed either entirely or not at all.
pub struct CredentialStore {
    backend: Option<Arc<dyn KeyValueStore>>,
    current: RwLock<Credentials>,
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("persistent", &self.is_persistent())
            .field("current", &self.snapshot())
            .finish()
    }
}

impl CredentialStore {
    /// Open over `backend` and load whatever record it holds
    pub fn open(backend: Arc<dyn KeyValueStore>) -> Self {
        let store = Self {
            backend: Some(backend),
            current: RwLock::new(Credentials::empty()),
        };
        store.load();
        store
    }

    /// Store with no persistence; credentials live in memory only
    pub fn detached() -> Self {
        Self {
            backend: None,
            current: RwLock::new(Credentials::empty()),
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.backend.is_some()
    }

    /// Re-read the persisted record, resetting to empty when it is unusable
    pub fn load(&self) {
        let loaded = match &self.backend {
            Some(backend) => match backend.get(RECORD_KEY) {
                Ok(Some(record)) => Credentials::from_record(&record).unwrap_or_else(|| {
                    warn!(
                        "Ignoring stored credential record ({} bytes, expected {})",
                        record.len(),
                        RECORD_LEN
                    );
                    Credentials::empty()
                }),
                Ok(None) => Credentials::empty(),
                Err(e) => {
                    warn!("Failed to read stored credentials: {}", e);
                    Credentials::empty()
                }
            },
            None => Credentials::empty(),
        };

        if loaded.is_configured() {
            info!("Loaded credentials for device {}", loaded.device_id());
        } else {
            debug!("No stored credentials");
        }
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = loaded;
    }

    /// Copy of the current credentials
    pub fn snapshot(&self) -> Credentials {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_configured(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_configured()
    }

    /// Replace the credentials and persist them
    ///
    /// The in-memory value is updated even when persistence fails; the error
    /// is still returned so the caller can report it.
    pub fn save(&self, credentials: Credentials) -> Result<()> {
        if !credentials.is_configured() {
            check_len("API key", credentials.api_key(), API_KEY_LEN)?;
            check_len("device ID", credentials.device_id(), DEVICE_ID_LEN)?;
        }

        let record = credentials.to_record();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = credentials;

        match &self.backend {
            Some(backend) => {
                backend.put(RECORD_KEY, &record)?;
                backend.commit()?;
                info!("Credentials saved");
            }
            None => warn!("No persistent store; credentials kept in memory only"),
        }
        Ok(())
    }

    /// Empty the credentials and erase the persisted record
    pub fn clear(&self) -> Result<()> {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Credentials::empty();

        if let Some(backend) = &self.backend {
            backend.erase(RECORD_KEY)?;
            backend.commit()?;
        }
        info!("Credentials cleared");
        Ok(())
    }
}
