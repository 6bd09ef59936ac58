//! Disposable address issuing
//!
//! Addresses have the form `YYMMDDNNN@domain`: the issue date followed by a
//! zero-padded random sequence in `000..=999`.

use crate::error::{AddressError, StoreError};
use crate::types::AddressRecord;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{Datelike, Local, NaiveDate};
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Domain used when none is configured
pub const DEFAULT_DOMAIN: &str = "otm.mec.mejsh.com";

/// Key-value store of issued addresses, keyed by address string
pub trait AddressRegistry: Send + Sync {
    fn exists(&self, address: &str) -> Result<bool, StoreError>;

    fn insert(&self, record: AddressRecord) -> Result<(), StoreError>;

    fn get(&self, address: &str) -> Result<Option<AddressRecord>, StoreError>;
}

/// Build an address for `date` with a random sequence drawn from `rng`
pub fn generate_address<R: Rng + ?Sized>(domain: &str, date: NaiveDate, rng: &mut R) -> String {
    let sequence: u16 = rng.gen_range(0..1000);
    format!(
        "{:02}{:02}{:02}{sequence:03}@{domain}",
        date.year().rem_euclid(100),
        date.month(),
        date.day()
    )
}

/// Build an address for today's local date
#[must_use]
pub fn generate_address_today(domain: &str) -> String {
    generate_address(domain, Local::now().date_naive(), &mut rand::thread_rng())
}

/// Whether `address` has the `YYMMDDNNN@domain` form and was issued on `today`
#[must_use]
pub fn validate_address(address: &str, domain: &str, today: NaiveDate) -> bool {
    let Some((local, address_domain)) = address.split_once('@') else {
        return false;
    };

    address_domain == domain
        && local.len() == 9
        && local.bytes().all(|b| b.is_ascii_digit())
        && local[..6] == today.format("%y%m%d").to_string()
}

/// Generate an address and register it.
///
/// A single candidate is tried; if it is already registered the call fails
/// with [`AddressError::AddressTaken`]. A registry failure while checking
/// for duplicates is logged and treated as "not taken".
pub fn create_address(
    registry: &dyn AddressRegistry,
    domain: &str,
) -> Result<AddressRecord, AddressError> {
    let address = generate_address_today(domain);
    register_address(registry, &address)
}

/// Register a specific address, rejecting duplicates
pub fn register_address(
    registry: &dyn AddressRegistry,
    address: &str,
) -> Result<AddressRecord, AddressError> {
    let taken = registry.exists(address).unwrap_or_else(|e| {
        warn!(address, error = %e, "Failed to check for existing address");
        false
    });

    if taken {
        debug!(address, "Address already exists");
        return Err(AddressError::AddressTaken(address.to_string()));
    }

    let record = AddressRecord::new(address);
    registry.insert(record.clone())?;
    info!(address, id = %record.id, "Created email address");

    Ok(record)
}

/// Token for carrying an address in a URL query
#[must_use]
pub fn share_token(address: &str) -> String {
    STANDARD.encode(address.as_bytes())
}

/// Recover the address from a [`share_token`]
#[must_use]
pub fn address_from_share_token(token: &str) -> Option<String> {
    let bytes = STANDARD.decode(token.trim()).ok()?;
    String::from_utf8(bytes).ok()
}

/// Recover the address from a [`share_token`] if it is one of ours and was
/// issued on `today`
#[must_use]
pub fn validated_address_from_share_token(
    token: &str,
    domain: &str,
    today: NaiveDate,
) -> Option<String> {
    let address = address_from_share_token(token)?;
    if validate_address(&address, domain, today) {
        Some(address)
    } else {
        debug!(address, "Rejected shared address");
        None
    }
}

/// In-process registry
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    records: RwLock<HashMap<String, AddressRecord>>,
}

impl MemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().map_or(0, |r| r.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AddressRegistry for MemoryRegistry {
    fn exists(&self, address: &str) -> Result<bool, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(records.contains_key(address))
    }

    fn insert(&self, record: AddressRecord) -> Result<(), StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        records.insert(record.address.clone(), record);
        Ok(())
    }

    fn get(&self, address: &str) -> Result<Option<AddressRecord>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(records.get(address).cloned())
    }
}

/// Registry persisted as a JSON object of address → record
#[derive(Debug)]
pub struct FileRegistry {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<BTreeMap<String, AddressRecord>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| StoreError::Backend(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    fn save(&self, records: &BTreeMap<String, AddressRecord>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let contents = serde_json::to_string_pretty(records)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        std::fs::write(&self.path, contents).map_err(|e| StoreError::io(&self.path, e))
    }
}

impl AddressRegistry for FileRegistry {
    fn exists(&self, address: &str) -> Result<bool, StoreError> {
        Ok(self.load()?.contains_key(address))
    }

    fn insert(&self, record: AddressRecord) -> Result<(), StoreError> {
        let _held = self
            .lock
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let mut records = self.load()?;
        records.insert(record.address.clone(), record);
        self.save(&records)
    }

    fn get(&self, address: &str) -> Result<Option<AddressRecord>, StoreError> {
        Ok(self.load()?.remove(address))
    }
}
