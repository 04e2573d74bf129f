//! SPNEGO token production.

use crate::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use freeipa_core::Error;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Produces `Authorization: Negotiate` headers for HTTP services.
///
/// Token production may contact the KDC and block; async callers should run it on a blocking
/// thread.
pub trait SpnegoAuthenticator: Send + Sync + fmt::Debug {
    /// Client principal the tokens are issued for, when known.
    fn principal(&self) -> Option<&str>;

    /// Produces an initial SPNEGO token for `HTTP@host`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Kerberos`] if no service ticket can be obtained.
    fn negotiate_token(&self, host: &str) -> Result<Vec<u8>>;

    /// Produces the full `Negotiate <base64>` header value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Kerberos`] if no service ticket can be obtained.
    fn authorization_header(&self, host: &str) -> Result<String> {
        let token = self.negotiate_token(host)?;
        Ok(format!("Negotiate {}", STANDARD.encode(token)))
    }
}

/// Binds a credential cache to an [`SpnegoAuthenticator`].
pub trait SpnegoMechanism: Send + Sync + fmt::Debug {
    /// Prepares token production from the tickets in `ccache`.
    ///
    /// `principal` selects the client principal; `None` uses the cache's default principal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Kerberos`] if the cache cannot be used.
    fn bind(&self, ccache: &Path, principal: Option<&str>)
        -> Result<Arc<dyn SpnegoAuthenticator>>;
}

/// Mechanism used when the crate is built without GSSAPI support.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedMechanism;

impl SpnegoMechanism for UnsupportedMechanism {
    fn bind(
        &self,
        _ccache: &Path,
        _principal: Option<&str>,
    ) -> Result<Arc<dyn SpnegoAuthenticator>> {
        Err(Error::Kerberos(
            "SPNEGO requires freeipa-kerberos to be built with the `gssapi` feature".to_string(),
        ))
    }
}

/// Returns the best mechanism available in this build.
#[must_use]
pub fn default_mechanism() -> Arc<dyn SpnegoMechanism> {
    #[cfg(feature = "gssapi")]
    {
        Arc::new(GssapiMechanism)
    }
    #[cfg(not(feature = "gssapi"))]
    {
        Arc::new(UnsupportedMechanism)
    }
}

#[cfg(feature = "gssapi")]
pub use gss::GssapiMechanism;

#[cfg(feature = "gssapi")]
mod gss {
    //! SPNEGO through the system GSSAPI library.
    //!
    //! Credentials are acquired with `gss_acquire_cred_from` and a `ccache` credential-store
    //! entry, so each authenticator reads its own cache and the process environment is never
    //! touched.

    use super::{SpnegoAuthenticator, SpnegoMechanism};
    use crate::Result;
    use freeipa_core::Error;
    use libgssapi_sys::{
        gss_OID_desc, gss_acquire_cred_from, gss_buffer_desc, gss_cred_id_t, gss_ctx_id_t,
        gss_delete_sec_context, gss_import_name, gss_init_sec_context,
        gss_key_value_element_desc, gss_key_value_set_desc, gss_name_t, gss_release_buffer,
        gss_release_cred, gss_release_name, OM_uint32,
    };
    use std::ffi::{c_void, CStr, CString};
    use std::path::Path;
    use std::sync::Arc;
    use std::{ptr, slice};
    use tracing::debug;

    const CCACHE_KEY: &[u8] = b"ccache\0";

    const GSS_C_INITIATE: i32 = 1;
    const GSS_C_MUTUAL_FLAG: OM_uint32 = 2;
    const GSS_C_INDEFINITE: OM_uint32 = 0xffff_ffff;
    // Routine and calling error bits of a major status.
    const GSS_ERROR_MASK: OM_uint32 = 0xffff_0000;

    // 1.3.6.1.5.5.2
    const MECH_SPNEGO: &[u8] = b"\x2b\x06\x01\x05\x05\x02";
    // 1.2.840.113554.1.2.1.4
    const NT_HOSTBASED_SERVICE: &[u8] = b"\x2a\x86\x48\x86\xf7\x12\x01\x02\x01\x04";
    // 1.2.840.113554.1.2.2.1
    const NT_KRB5_PRINCIPAL: &[u8] = b"\x2a\x86\x48\x86\xf7\x12\x01\x02\x02\x01";

    /// SPNEGO through the system GSSAPI library.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct GssapiMechanism;

    impl SpnegoMechanism for GssapiMechanism {
        fn bind(
            &self,
            ccache: &Path,
            principal: Option<&str>,
        ) -> Result<Arc<dyn SpnegoAuthenticator>> {
            let authenticator = GssapiAuthenticator {
                store: CredStore::for_ccache(ccache)?,
                principal: principal.map(str::to_string),
            };
            drop(authenticator.acquire()?);
            debug!(ccache = %ccache.display(), "bound GSSAPI credential");
            Ok(Arc::new(authenticator))
        }
    }

    /// A one-entry GSSAPI credential store naming a `FILE:` cache.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(super) struct CredStore {
        ccache: CString,
    }

    impl CredStore {
        pub(super) fn for_ccache(ccache: &Path) -> Result<Self> {
            let ccache = CString::new(format!("FILE:{}", ccache.display())).map_err(|_| {
                Error::Kerberos(format!(
                    "credential cache path {} contains a NUL byte",
                    ccache.display()
                ))
            })?;
            Ok(Self { ccache })
        }

        pub(super) fn key() -> &'static CStr {
            CStr::from_bytes_with_nul(CCACHE_KEY).unwrap_or_default()
        }

        pub(super) fn ccache(&self) -> &CStr {
            &self.ccache
        }

        fn element(&self) -> gss_key_value_element_desc {
            gss_key_value_element_desc {
                key: Self::key().as_ptr(),
                value: self.ccache.as_ptr(),
            }
        }
    }

    #[derive(Debug)]
    struct GssapiAuthenticator {
        store: CredStore,
        principal: Option<String>,
    }

    impl GssapiAuthenticator {
        fn acquire(&self) -> Result<CredHandle> {
            let name = self
                .principal
                .as_deref()
                .map(|principal| import_name(principal, NT_KRB5_PRINCIPAL))
                .transpose()?;
            let mut element = self.store.element();
            let store = gss_key_value_set_desc {
                count: 1,
                elements: &mut element,
            };
            let mut cred = CredHandle(ptr::null_mut());
            let mut minor: OM_uint32 = 0;
            // SAFETY: the name, store and element outlive the call; the returned handle is
            // released by `CredHandle`.
            let major = unsafe {
                gss_acquire_cred_from(
                    &mut minor,
                    name.as_ref().map_or(ptr::null_mut(), |n| n.0),
                    GSS_C_INDEFINITE,
                    ptr::null_mut(),
                    GSS_C_INITIATE,
                    &store,
                    &mut cred.0,
                    ptr::null_mut(),
                    ptr::null_mut(),
                )
            };
            check(major, minor, "acquire credential")?;
            Ok(cred)
        }
    }

    impl SpnegoAuthenticator for GssapiAuthenticator {
        fn principal(&self) -> Option<&str> {
            self.principal.as_deref()
        }

        fn negotiate_token(&self, host: &str) -> Result<Vec<u8>> {
            let cred = self.acquire()?;
            let target = import_name(&format!("HTTP@{host}"), NT_HOSTBASED_SERVICE)?;
            let mut mech_bytes = MECH_SPNEGO.to_vec();
            let mut mech = oid(&mut mech_bytes);
            let mut context = ContextHandle(ptr::null_mut());
            let mut output = OutputBuffer::new();
            let mut minor: OM_uint32 = 0;
            // SAFETY: all inputs outlive the call; the context and output buffer are released
            // by their guards.
            let major = unsafe {
                gss_init_sec_context(
                    &mut minor,
                    cred.0,
                    &mut context.0,
                    target.0,
                    &mut mech,
                    GSS_C_MUTUAL_FLAG,
                    0,
                    ptr::null_mut(),
                    ptr::null_mut(),
                    ptr::null_mut(),
                    &mut output.0,
                    ptr::null_mut(),
                    ptr::null_mut(),
                )
            };
            check(major, minor, "initiate security context")?;

            let token = output.to_vec();
            if token.is_empty() {
                return Err(Error::Kerberos(format!(
                    "GSSAPI produced no token for HTTP@{host}"
                )));
            }
            Ok(token)
        }
    }

    fn oid(bytes: &mut [u8]) -> gss_OID_desc {
        gss_OID_desc {
            length: OM_uint32::try_from(bytes.len()).unwrap_or_default(),
            elements: bytes.as_mut_ptr().cast::<c_void>(),
        }
    }

    fn import_name(name: &str, name_type: &[u8]) -> Result<NameHandle> {
        let mut type_bytes = name_type.to_vec();
        let mut name_type = oid(&mut type_bytes);
        let mut buffer = gss_buffer_desc {
            length: name.len(),
            value: name.as_ptr().cast_mut().cast::<c_void>(),
        };
        let mut output = NameHandle(ptr::null_mut());
        let mut minor: OM_uint32 = 0;
        // SAFETY: the library copies the buffer; the name is released by `NameHandle`.
        let major =
            unsafe { gss_import_name(&mut minor, &mut buffer, &mut name_type, &mut output.0) };
        check(major, minor, "import name")?;
        Ok(output)
    }

    fn check(major: OM_uint32, minor: OM_uint32, operation: &str) -> Result<()> {
        if major & GSS_ERROR_MASK == 0 {
            Ok(())
        } else {
            Err(Error::Kerberos(format!(
                "GSSAPI failed to {operation} (major {major:#x}, minor {minor})"
            )))
        }
    }

    struct NameHandle(gss_name_t);

    impl Drop for NameHandle {
        fn drop(&mut self) {
            if !self.0.is_null() {
                let mut minor: OM_uint32 = 0;
                // SAFETY: the handle came from `gss_import_name` and is released once.
                unsafe { gss_release_name(&mut minor, &mut self.0) };
            }
        }
    }

    struct CredHandle(gss_cred_id_t);

    impl Drop for CredHandle {
        fn drop(&mut self) {
            if !self.0.is_null() {
                let mut minor: OM_uint32 = 0;
                // SAFETY: the handle came from `gss_acquire_cred_from` and is released once.
                unsafe { gss_release_cred(&mut minor, &mut self.0) };
            }
        }
    }

    struct ContextHandle(gss_ctx_id_t);

    impl Drop for ContextHandle {
        fn drop(&mut self) {
            if !self.0.is_null() {
                let mut minor: OM_uint32 = 0;
                // SAFETY: the handle came from `gss_init_sec_context` and is deleted once.
                unsafe { gss_delete_sec_context(&mut minor, &mut self.0, ptr::null_mut()) };
            }
        }
    }

    struct OutputBuffer(gss_buffer_desc);

    impl OutputBuffer {
        fn new() -> Self {
            Self(gss_buffer_desc {
                length: 0,
                value: ptr::null_mut(),
            })
        }

        fn to_vec(&self) -> Vec<u8> {
            if self.0.value.is_null() || self.0.length == 0 {
                return Vec::new();
            }
            // SAFETY: GSSAPI filled `length` bytes at `value`.
            unsafe { slice::from_raw_parts(self.0.value.cast::<u8>(), self.0.length) }.to_vec()
        }
    }

    impl Drop for OutputBuffer {
        fn drop(&mut self) {
            if !self.0.value.is_null() {
                let mut minor: OM_uint32 = 0;
                // SAFETY: the buffer was allocated by GSSAPI and is released once.
                unsafe { gss_release_buffer(&mut minor, &mut self.0) };
            }
        }
    }
}
