//! Mosquitto auth plugin exports (plugin API version 2)
//!
//! Load the built `cdylib` with `auth_plugin /path/to/libautohome_auth.so` and
//! pass options as `auth_opt_db_file`, `auth_opt_superuser` and
//! `auth_opt_guest_secret`.
//!
//! The broker owns the plugin through its `user_data` pointer: `init` boxes an
//! [`AuthPlugin`] and hands the raw pointer back, `cleanup` takes it back and
//! drops it.

use crate::acl::AccessKind;
use crate::plugin::{AuthPlugin, Status, PLUGIN_API_VERSION};
use std::ffi::{c_char, c_int, c_void, CStr};
use std::ptr;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

pub const MOSQ_ERR_SUCCESS: c_int = 0;
pub const MOSQ_ERR_AUTH: c_int = 11;
pub const MOSQ_ERR_ACL_DENIED: c_int = 12;
pub const MOSQ_ERR_UNKNOWN: c_int = 13;

pub const MOSQ_ACL_READ: c_int = 1;
pub const MOSQ_ACL_WRITE: c_int = 2;

/// `struct mosquitto_auth_opt`
#[repr(C)]
pub struct MosquittoAuthOpt {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

#[no_mangle]
pub extern "C" fn mosquitto_auth_plugin_version() -> c_int {
    PLUGIN_API_VERSION
}

/// # Safety
///
/// `user_data` must be a valid pointer to writable storage. `auth_opts` must
/// point to `auth_opt_count` options whose keys and values are null or
/// NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn mosquitto_auth_plugin_init(
    user_data: *mut *mut c_void,
    auth_opts: *mut MosquittoAuthOpt,
    auth_opt_count: c_int,
) -> c_int {
    install_logging();

    if user_data.is_null() {
        return Status::FailedSqlite.code();
    }
    *user_data = ptr::null_mut();

    let options = collect_options(auth_opts, auth_opt_count);
    let mut plugin = Box::new(AuthPlugin::new());

    match plugin.init(options) {
        Ok(()) => {
            *user_data = Box::into_raw(plugin).cast();
            Status::Success.code()
        }
        Err(e) => e.status().code(),
    }
}

/// # Safety
///
/// `user_data` must be null or the pointer stored by
/// [`mosquitto_auth_plugin_init`], and must not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn mosquitto_auth_plugin_cleanup(
    user_data: *mut c_void,
    _auth_opts: *mut MosquittoAuthOpt,
    _auth_opt_count: c_int,
) -> c_int {
    if user_data.is_null() {
        return Status::Success.code();
    }

    let mut plugin = Box::from_raw(user_data.cast::<AuthPlugin>());
    match plugin.cleanup() {
        Ok(()) => Status::Success.code(),
        Err(e) => e.status().code(),
    }
}

/// # Safety
///
/// `user_data` must be null or the pointer stored by
/// [`mosquitto_auth_plugin_init`].
#[no_mangle]
pub unsafe extern "C" fn mosquitto_auth_security_init(
    user_data: *mut c_void,
    _auth_opts: *mut MosquittoAuthOpt,
    _auth_opt_count: c_int,
    reload: bool,
) -> c_int {
    if let Some(plugin) = plugin_ref(user_data) {
        let _ = plugin.security_init(reload);
    }
    Status::Success.code()
}

/// # Safety
///
/// `user_data` must be null or the pointer stored by
/// [`mosquitto_auth_plugin_init`].
#[no_mangle]
pub unsafe extern "C" fn mosquitto_auth_security_cleanup(
    user_data: *mut c_void,
    _auth_opts: *mut MosquittoAuthOpt,
    _auth_opt_count: c_int,
    reload: bool,
) -> c_int {
    if let Some(plugin) = plugin_ref(user_data) {
        let _ = plugin.security_cleanup(reload);
    }
    Status::Success.code()
}

/// # Safety
///
/// `user_data` must be null or the pointer stored by
/// [`mosquitto_auth_plugin_init`]. String arguments must be null or
/// NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn mosquitto_auth_acl_check(
    user_data: *mut c_void,
    clientid: *const c_char,
    username: *const c_char,
    topic: *const c_char,
    access: c_int,
) -> c_int {
    let Some(plugin) = plugin_ref(user_data) else {
        return MOSQ_ERR_UNKNOWN;
    };

    match plugin.acl_check(
        opt_str(clientid),
        opt_str(username),
        opt_str(topic),
        access_kind(access),
    ) {
        Ok(decision) if decision.allowed => MOSQ_ERR_SUCCESS,
        Ok(_) => MOSQ_ERR_ACL_DENIED,
        Err(_) => MOSQ_ERR_UNKNOWN,
    }
}

/// # Safety
///
/// `user_data` must be null or the pointer stored by
/// [`mosquitto_auth_plugin_init`]. String arguments must be null or
/// NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn mosquitto_auth_unpwd_check(
    user_data: *mut c_void,
    username: *const c_char,
    password: *const c_char,
) -> c_int {
    let Some(plugin) = plugin_ref(user_data) else {
        return MOSQ_ERR_UNKNOWN;
    };

    let password = opt_bytes(password);
    let username = if username.is_null() {
        None
    } else {
        match CStr::from_ptr(username).to_str() {
            Ok(name) => Some(name),
            Err(_) => return MOSQ_ERR_AUTH,
        }
    };

    match plugin.unpwd_check(username, password) {
        Ok(result) if result.authenticated => MOSQ_ERR_SUCCESS,
        Ok(_) => MOSQ_ERR_AUTH,
        Err(_) => MOSQ_ERR_UNKNOWN,
    }
}

/// # Safety
///
/// Never dereferences its arguments.
#[no_mangle]
pub unsafe extern "C" fn mosquitto_auth_psk_key_get(
    _user_data: *mut c_void,
    _hint: *const c_char,
    _identity: *const c_char,
    _key: *mut c_char,
    _max_key_len: c_int,
) -> c_int {
    Status::NotRequired.code()
}

/// Log to stderr unless the host already installed a subscriber.
fn install_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}

fn access_kind(access: c_int) -> AccessKind {
    if access & MOSQ_ACL_WRITE != 0 {
        AccessKind::Write
    } else {
        if access != MOSQ_ACL_READ {
            debug!(access, "Unknown access flag, treating as read");
        }
        AccessKind::Read
    }
}

unsafe fn plugin_ref<'a>(user_data: *mut c_void) -> Option<&'a AuthPlugin> {
    user_data.cast::<AuthPlugin>().as_ref()
}

/// Strings that are not valid UTF-8 are treated as absent.
unsafe fn opt_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        None
    } else {
        CStr::from_ptr(ptr).to_str().ok()
    }
}

unsafe fn opt_bytes<'a>(ptr: *const c_char) -> Option<&'a [u8]> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_bytes())
    }
}

unsafe fn collect_options(opts: *const MosquittoAuthOpt, count: c_int) -> Vec<(String, String)> {
    if opts.is_null() || count <= 0 {
        return Vec::new();
    }

    std::slice::from_raw_parts(opts, count as usize)
        .iter()
        .filter(|opt| !opt.key.is_null() && !opt.value.is_null())
        .map(|opt| {
            (
                CStr::from_ptr(opt.key).to_string_lossy().into_owned(),
                CStr::from_ptr(opt.value).to_string_lossy().into_owned(),
            )
        })
        .collect()
}
