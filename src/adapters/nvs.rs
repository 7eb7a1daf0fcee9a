//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`StoragePort`] for schedule persistence.
//!
//! - **`target_os = "espidf"`**: raw `nvs_*` calls against the default
//!   partition.  Every write is followed by `nvs_commit()`, which is atomic.
//! - **all other targets**: an in-memory map, for host tests.
//!
//! Namespace and key names are truncated to the 15-byte NVS limit.

use crate::app::ports::{StorageError, StoragePort};
use log::info;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::warn;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

/// NUL-terminated copy of an NVS name (max 15 bytes + NUL).
#[cfg(target_os = "espidf")]
fn c_name(s: &str) -> [u8; 16] {
    let mut buf = [0u8; 16];
    let n = s.len().min(15);
    buf[..n].copy_from_slice(&s.as_bytes()[..n]);
    buf
}

// Bindgen exposes the error macros as `u32`.
#[cfg(target_os = "espidf")]
const OK: esp_err_t = ESP_OK as esp_err_t;
#[cfg(target_os = "espidf")]
const NOT_FOUND: esp_err_t = ESP_ERR_NVS_NOT_FOUND as esp_err_t;
#[cfg(target_os = "espidf")]
const NO_SPACE: esp_err_t = ESP_ERR_NVS_NOT_ENOUGH_SPACE as esp_err_t;

#[cfg(target_os = "espidf")]
fn map_err(code: esp_err_t) -> StorageError {
    match code {
        NOT_FOUND => StorageError::NotFound,
        NO_SPACE => StorageError::Full,
        _ => StorageError::IoError,
    }
}

impl NvsAdapter {
    /// Initialise NVS flash.
    ///
    /// On first boot or after a layout version change the partition is
    /// erased and re-initialised.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS use.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as esp_err_t
                || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as esp_err_t
            {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != OK || unsafe { nvs_flash_init() } != OK {
                    return Err(StorageError::IoError);
                }
            } else if ret != OK {
                return Err(StorageError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{namespace}::{key}")
    }

    /// Open a namespace, run `f` with the handle, then close it.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, esp_err_t>,
    {
        let ns = c_name(namespace);
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let mut handle: nvs_handle_t = 0;
        // SAFETY: `ns` is NUL-terminated and outlives the call.
        let ret = unsafe { nvs_open(ns.as_ptr().cast(), mode, &mut handle) };
        if ret != OK {
            return Err(map_err(ret));
        }
        let result = f(handle);
        // SAFETY: `handle` was opened above and is closed exactly once.
        unsafe { nvs_close(handle) };
        result.map_err(map_err)
    }

    /// Commit helper for write-mode closures.
    #[cfg(target_os = "espidf")]
    fn commit(handle: nvs_handle_t, ret: esp_err_t) -> Result<(), esp_err_t> {
        if ret != OK {
            return Err(ret);
        }
        match unsafe { nvs_commit(handle) } {
            OK => Ok(()),
            e => Err(e),
        }
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let store = self.store.borrow();
            let data = store
                .get(&Self::composite_key(namespace, key))
                .ok_or(StorageError::NotFound)?;
            // nvs_get_blob fails with ESP_ERR_NVS_INVALID_LENGTH here.
            let dst = buf.get_mut(..data.len()).ok_or(StorageError::IoError)?;
            dst.copy_from_slice(data);
            Ok(data.len())
        }

        #[cfg(target_os = "espidf")]
        {
            let k = c_name(key);
            Self::with_nvs_handle(namespace, false, |handle| {
                let mut size = buf.len();
                // SAFETY: `buf` is valid for `size` bytes; NVS writes at most that.
                let ret = unsafe {
                    nvs_get_blob(handle, k.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size)
                };
                if ret == OK { Ok(size) } else { Err(ret) }
            })
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .insert(Self::composite_key(namespace, key), data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let k = c_name(key);
            Self::with_nvs_handle(namespace, true, |handle| {
                let ret = unsafe {
                    nvs_set_blob(handle, k.as_ptr().cast(), data.as_ptr().cast(), data.len())
                };
                Self::commit(handle, ret)
            })
        }
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .remove(&Self::composite_key(namespace, key));
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let k = c_name(key);
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let ret = unsafe { nvs_erase_key(handle, k.as_ptr().cast()) };
                let ret = if ret == NOT_FOUND { OK } else { ret };
                Self::commit(handle, ret)
            });
            match result {
                Err(StorageError::NotFound) => Ok(()),
                other => other,
            }
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow()
                .contains_key(&Self::composite_key(namespace, key))
        }

        #[cfg(target_os = "espidf")]
        {
            let k = c_name(key);
            Self::with_nvs_handle(namespace, false, |handle| {
                let ret = unsafe { nvs_find_key(handle, k.as_ptr().cast(), core::ptr::null_mut()) };
                Ok(ret == OK)
            })
            .unwrap_or(false)
        }
    }
}
