// Raw JNI invocation types used by the engine backend.
use std::os::raw::c_void;

pub use jni_sys::{
    JNI_EDETACHED, JNI_EVERSION, JNI_FALSE, JNI_OK, JNI_VERSION_1_4, JNIEnv, JNINativeInterface_,
    JavaVM, JavaVMInitArgs, JavaVMOption, jboolean, jclass, jint, jmethodID, jobject, jvalue,
};

/// Signature of `JNI_CreateJavaVM` as exported by the engine library.
pub type CreateJavaVm =
    unsafe extern "system" fn(pvm: *mut *mut JavaVM, penv: *mut *mut c_void, args: *mut c_void) -> jint;

/// Nul-terminated name of the creation symbol for `dlsym`/`GetProcAddress`.
pub const CREATE_JAVA_VM: &[u8] = b"JNI_CreateJavaVM\0";
