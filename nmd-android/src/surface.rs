//! Durable references to `android.view.Surface` objects.
//!
//! The engine's `opaque` option takes the address of a `jobject` slot. The
//! slot is boxed so its address stays put while the binding moves into a
//! session, and the global reference behind it is deleted when the binding
//! is dropped, after the session has closed its engine.

use std::ffi::c_void;

use anyhow::{anyhow, Result};
use jni::objects::{GlobalRef, JObject, JObjectArray};
use jni::sys::jobject;
use jni::JNIEnv;

use nmd_core::SurfaceBinding;

pub struct AndroidSurface {
    slot: Box<jobject>,
    _global: GlobalRef,
}

impl AndroidSurface {
    /// Take a global reference on `surface`. A null surface yields `None`.
    pub fn acquire(env: &mut JNIEnv, surface: &JObject) -> Result<Option<Self>> {
        if surface.is_null() {
            return Ok(None);
        }
        let global = env
            .new_global_ref(surface)
            .map_err(|e| anyhow!("Failed to create global surface reference: {}", e))?;
        let slot = Box::new(global.as_obj().as_raw());
        Ok(Some(Self {
            slot,
            _global: global,
        }))
    }

    /// Global references for the first `count` entries of `surfaces`
    pub fn acquire_all(
        env: &mut JNIEnv,
        surfaces: &JObjectArray,
        count: usize,
    ) -> Result<Vec<Option<Self>>> {
        let length = env
            .get_array_length(surfaces)
            .map_err(|e| anyhow!("Failed to read surface array: {}", e))? as usize;
        if count > length {
            return Err(nmd_core::HarnessError::SurfaceCount {
                expected: count,
                actual: length,
            }
            .into());
        }

        let mut bound = Vec::with_capacity(count);
        for i in 0..count {
            let local = env
                .get_object_array_element(surfaces, i as i32)
                .map_err(|e| anyhow!("Failed to read surface {}: {}", i, e))?;
            let surface = Self::acquire(env, &local);
            // The local slot is freed whether or not the global ref was taken
            let _ = env.delete_local_ref(local);
            bound.push(surface?);
        }
        Ok(bound)
    }
}

impl SurfaceBinding for AndroidSurface {
    fn opaque(&self) -> *mut c_void {
        &*self.slot as *const jobject as *mut c_void
    }
}
