//! Purpose: JNI-backed engine: `dlopen` a JVM library and drive it through the invocation API.
//! Exports: `JniEngineLoader`.
//! Role: Production implementation of the engine traits.
//! Invariants: All raw JNI calls are confined to this module + `sys`.
//! Invariants: Opened libraries are leaked and stay mapped for the life of the process.
//! Invariants: Pending exceptions are cleared before control returns to the caller.
//! Invariants: Local class references are released after every call.
//! Invariants: Only threads attached here are detached here.
use std::ffi::{CString, OsStr, OsString};
use std::marker::PhantomData;
use std::os::raw::{c_char, c_void};
use std::path::Path;
use std::ptr;
use std::sync::Arc;

use libloading::Library;

use super::sys;
use super::{
    AttachedThread, CREATE_SYMBOL, EngineError, EngineLibrary, EngineLoader, EntryPoint,
    RuntimeInstance,
};

#[derive(Clone, Copy, Debug, Default)]
pub struct JniEngineLoader;

impl EngineLoader for JniEngineLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn EngineLibrary>, EngineError> {
        let library = keep_loaded(path)?;
        Ok(Box::new(JniLibrary { library }))
    }
}

/// Opens `path` and leaks the handle so the engine is never unloaded.
fn keep_loaded(path: &Path) -> Result<&'static Library, EngineError> {
    let library = unsafe { Library::new(path) }.map_err(|err| EngineError::Load {
        path: path.to_path_buf(),
        source: Box::new(err),
    })?;
    Ok(Box::leak(Box::new(library)))
}

struct JniLibrary {
    library: &'static Library,
}

impl EngineLibrary for JniLibrary {
    fn create_instance(
        &self,
        options: &[OsString],
    ) -> Result<Arc<dyn RuntimeInstance>, EngineError> {
        let create: sys::CreateJavaVm = unsafe {
            let symbol = self
                .library
                .get::<sys::CreateJavaVm>(sys::CREATE_JAVA_VM)
                .map_err(|err| EngineError::SymbolMissing {
                    symbol: CREATE_SYMBOL,
                    source: Some(Box::new(err)),
                })?;
            *symbol
        };

        let option_strings = options
            .iter()
            .map(|option| {
                CString::new(option_bytes(option))
                    .map_err(|_| EngineError::InvalidOption(option.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut raw_options = option_strings
            .iter()
            .map(|option| sys::JavaVMOption {
                optionString: option.as_ptr() as *mut c_char,
                extraInfo: ptr::null_mut(),
            })
            .collect::<Vec<_>>();
        let mut args = sys::JavaVMInitArgs {
            version: sys::JNI_VERSION_1_4,
            nOptions: raw_options.len() as sys::jint,
            options: raw_options.as_mut_ptr(),
            ignoreUnrecognized: sys::JNI_FALSE,
        };

        let mut vm: *mut sys::JavaVM = ptr::null_mut();
        let mut env: *mut c_void = ptr::null_mut();
        let code = unsafe { create(&mut vm, &mut env, &mut args as *mut _ as *mut c_void) };
        if code < 0 || vm.is_null() {
            return Err(EngineError::CreateRejected { code });
        }

        Ok(Arc::new(JniRuntime { vm }))
    }
}

#[cfg(unix)]
fn option_bytes(option: &OsStr) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    option.as_bytes().to_vec()
}

#[cfg(not(unix))]
fn option_bytes(option: &OsStr) -> Vec<u8> {
    option.to_string_lossy().into_owned().into_bytes()
}

struct JniRuntime {
    vm: *mut sys::JavaVM,
}

// The invocation interface is callable from any thread once attached.
unsafe impl Send for JniRuntime {}
unsafe impl Sync for JniRuntime {}

/// How the calling thread relates to the runtime, from `GetEnv`'s result.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Attachment {
    Existing,
    Required,
}

fn attachment(get_env_code: sys::jint) -> Result<Attachment, EngineError> {
    match get_env_code {
        sys::JNI_OK => Ok(Attachment::Existing),
        sys::JNI_EDETACHED => Ok(Attachment::Required),
        code => Err(EngineError::AttachFailed { code }),
    }
}

macro_rules! vm_fn {
    ($vm:expr, $name:ident) => {
        unsafe { (**$vm).$name }.ok_or(EngineError::SymbolMissing {
            symbol: stringify!($name),
            source: None,
        })?
    };
}

impl RuntimeInstance for JniRuntime {
    fn attach(&self) -> Result<Box<dyn AttachedThread + '_>, EngineError> {
        let get_env = vm_fn!(self.vm, GetEnv);
        let mut env: *mut c_void = ptr::null_mut();
        let code = unsafe { get_env(self.vm, &mut env, sys::JNI_VERSION_1_4) };

        let detach_on_drop = match attachment(code)? {
            Attachment::Existing => false,
            Attachment::Required => {
                let attach = vm_fn!(self.vm, AttachCurrentThread);
                let code = unsafe { attach(self.vm, &mut env, ptr::null_mut()) };
                if code != sys::JNI_OK {
                    return Err(EngineError::AttachFailed { code });
                }
                true
            }
        };
        if env.is_null() {
            return Err(EngineError::AttachFailed { code });
        }

        Ok(Box::new(JniThread {
            vm: self.vm,
            env: env as *mut sys::JNIEnv,
            detach_on_drop,
            _runtime: PhantomData,
        }))
    }
}

struct JniThread<'a> {
    vm: *mut sys::JavaVM,
    env: *mut sys::JNIEnv,
    detach_on_drop: bool,
    _runtime: PhantomData<&'a JniRuntime>,
}

impl Drop for JniThread<'_> {
    fn drop(&mut self) {
        if !self.detach_on_drop {
            return;
        }
        let Some(detach) = (unsafe { (**self.vm).DetachCurrentThread }) else {
            tracing::warn!("engine has no DetachCurrentThread; thread stays attached");
            return;
        };
        let code = unsafe { detach(self.vm) };
        if code != sys::JNI_OK {
            tracing::warn!(code, "unable to detach thread from runtime");
        }
    }
}

macro_rules! jni_fn {
    ($thread:expr, $name:ident) => {
        unsafe { (**$thread.env).$name }.ok_or(EngineError::SymbolMissing {
            symbol: stringify!($name),
            source: None,
        })?
    };
}

impl JniThread<'_> {
    /// Fresh name-based lookup of the class and static method behind `entry`.
    fn lookup(&mut self, entry: &EntryPoint) -> Result<(sys::jclass, sys::jmethodID), EngineError> {
        let class_not_found = || EngineError::ClassNotFound { class: entry.class };
        let method_not_found = || EngineError::MethodNotFound {
            class: entry.class,
            method: entry.method,
        };

        let find_class = jni_fn!(self, FindClass);
        let get_static_method = jni_fn!(self, GetStaticMethodID);

        let class_name = CString::new(entry.class).map_err(|_| class_not_found())?;
        let class = unsafe { find_class(self.env, class_name.as_ptr()) };
        if class.is_null() {
            self.clear_exception()?;
            return Err(class_not_found());
        }

        let (Ok(method_name), Ok(signature)) =
            (CString::new(entry.method), CString::new(entry.signature))
        else {
            self.delete_local(class)?;
            return Err(method_not_found());
        };
        let method =
            unsafe { get_static_method(self.env, class, method_name.as_ptr(), signature.as_ptr()) };
        if method.is_null() {
            self.clear_exception()?;
            self.delete_local(class)?;
            return Err(method_not_found());
        }

        Ok((class, method))
    }

    fn clear_exception(&mut self) -> Result<bool, EngineError> {
        let exception_check = jni_fn!(self, ExceptionCheck);
        let exception_clear = jni_fn!(self, ExceptionClear);
        let pending = unsafe { exception_check(self.env) } != sys::JNI_FALSE;
        if pending {
            unsafe { exception_clear(self.env) };
        }
        Ok(pending)
    }

    fn delete_local(&mut self, object: sys::jobject) -> Result<(), EngineError> {
        let delete_local_ref = jni_fn!(self, DeleteLocalRef);
        unsafe { delete_local_ref(self.env, object) };
        Ok(())
    }
}

impl AttachedThread for JniThread<'_> {
    fn call_static(&mut self, entry: &EntryPoint) -> Result<(), EngineError> {
        let (class, method) = self.lookup(entry)?;
        let call = jni_fn!(self, CallStaticVoidMethodA);
        unsafe { call(self.env, class, method, ptr::null()) };
        let faulted = self.clear_exception()?;
        self.delete_local(class)?;
        if faulted {
            return Err(EngineError::Fault {
                class: entry.class,
                method: entry.method,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Loads everywhere on Linux and exports no JNI symbols.
    #[cfg(target_os = "linux")]
    const NON_ENGINE_LIBRARY: &str = "libc.so.6";

    #[test]
    fn loading_a_non_library_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("libjvm.so");
        std::fs::write(&path, b"not a shared object").expect("write");

        let err = JniEngineLoader.load(&path).err().expect("load must fail");
        match err {
            EngineError::Load { path: failed, .. } => assert_eq!(failed, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn library_without_create_symbol_is_reported() {
        let library = JniEngineLoader
            .load(Path::new(NON_ENGINE_LIBRARY))
            .expect("libc loads");
        match library.create_instance(&[]) {
            Err(EngineError::SymbolMissing { symbol, source }) => {
                assert_eq!(symbol, CREATE_SYMBOL);
                assert!(source.is_some());
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("libc cannot create a runtime"),
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn engine_library_outlives_its_owner() {
        let library = keep_loaded(Path::new(NON_ENGINE_LIBRARY)).expect("libc loads");
        drop(Box::new(JniLibrary { library }) as Box<dyn EngineLibrary>);

        let strlen = unsafe {
            library
                .get::<unsafe extern "C" fn(*const c_char) -> usize>(b"strlen\0")
                .expect("strlen")
        };
        assert_eq!(unsafe { strlen(c"rig".as_ptr()) }, 3);
    }

    #[test]
    fn only_detached_threads_get_attached() {
        assert_eq!(attachment(sys::JNI_OK).expect("ok"), Attachment::Existing);
        assert_eq!(
            attachment(sys::JNI_EDETACHED).expect("detached"),
            Attachment::Required
        );
        match attachment(sys::JNI_EVERSION) {
            Err(EngineError::AttachFailed { code }) => assert_eq!(code, sys::JNI_EVERSION),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
