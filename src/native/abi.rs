//! C ABI of the accelerated engine.
//!
//! Every function takes the opaque handle returned by [`kmq_init`] and
//! reports failure through a `KMQ_*` status code. Panics are caught at the
//! boundary and reported as [`KMQ_ERR_INTERNAL`].
//!
//! # Safety
//!
//! Callers must pass a handle obtained from `kmq_init` that has not been
//! released, and buffers at least as long as the accompanying length fields
//! say.

use super::state::NativeState;
use super::{
    status_of, RawBounds, RawCluster, RawConvergence, RawParams, ABI_VERSION, KMQ_ERR_DIMENSIONS,
    KMQ_ERR_INTERNAL, KMQ_ERR_NULL, KMQ_OK,
};
use crate::data::Bounds;
use crate::error::KMeansError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::{ptr, slice};

fn guard<F>(f: F) -> i32
where
    F: FnOnce() -> Result<(), KMeansError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => KMQ_OK,
        Ok(Err(err)) => status_of(&err),
        Err(_) => KMQ_ERR_INTERNAL,
    }
}

unsafe fn state_mut<'a>(handle: *mut NativeState) -> Result<&'a mut NativeState, i32> {
    handle.as_mut().ok_or(KMQ_ERR_NULL)
}

/// Layout version implemented by this library.
#[no_mangle]
pub extern "C" fn kmq_abi_version() -> u32 {
    ABI_VERSION
}

/// Create an engine handle. Returns null on failure and writes the reason to
/// `status` when it is non-null.
///
/// # Safety
///
/// `params` must point to a valid [`RawParams`]; `status` may be null.
#[no_mangle]
pub unsafe extern "C" fn kmq_init(params: *const RawParams, status: *mut i32) -> *mut NativeState {
    let mut handle = ptr::null_mut();
    let code = match params.as_ref() {
        None => KMQ_ERR_NULL,
        Some(params) => guard(|| {
            handle = Box::into_raw(Box::new(NativeState::new(params)?));
            Ok(())
        }),
    };
    if let Some(status) = status.as_mut() {
        *status = code;
    }
    handle
}

/// Seed `k` clusters. With a null `centroids`, draws them inside `bounds`;
/// otherwise copies `centroids_len` values (`k * dim`).
///
/// # Safety
///
/// See the module documentation.
#[no_mangle]
pub unsafe extern "C" fn kmq_seed(
    handle: *mut NativeState,
    bounds: *const RawBounds,
    centroids: *const i32,
    centroids_len: u64,
) -> i32 {
    let state = match state_mut(handle) {
        Ok(state) => state,
        Err(code) => return code,
    };
    let bounds = match bounds.as_ref() {
        Some(b) if !b.lower.is_null() && !b.upper.is_null() => b,
        _ => return KMQ_ERR_NULL,
    };
    let dim = bounds.dim as usize;
    let lower = slice::from_raw_parts(bounds.lower, dim).to_vec();
    let upper = slice::from_raw_parts(bounds.upper, dim).to_vec();
    let explicit = if centroids.is_null() {
        None
    } else {
        Some(slice::from_raw_parts(centroids, centroids_len as usize))
    };

    guard(|| state.seed(Bounds::new(lower, upper)?, explicit))
}

/// Empty all memberships.
///
/// # Safety
///
/// See the module documentation.
#[no_mangle]
pub unsafe extern "C" fn kmq_clear(handle: *mut NativeState) -> i32 {
    match state_mut(handle) {
        Ok(state) => guard(|| {
            state.clear();
            Ok(())
        }),
        Err(code) => code,
    }
}

/// Assign every point of the flat data set (`n_points * dim` values).
///
/// # Safety
///
/// See the module documentation.
#[no_mangle]
pub unsafe extern "C" fn kmq_assign(handle: *mut NativeState, data: *const i32, n_points: u64) -> i32 {
    let state = match state_mut(handle) {
        Ok(state) => state,
        Err(code) => return code,
    };
    if data.is_null() {
        return KMQ_ERR_NULL;
    }
    let len = match (n_points as usize).checked_mul(state.dim()) {
        Some(len) => len,
        None => return KMQ_ERR_DIMENSIONS,
    };
    let data = slice::from_raw_parts(data, len);
    guard(|| state.assign(data))
}

/// Recompute centroids. Writes the number of reseeded clusters to `reseeded`
/// when it is non-null.
///
/// # Safety
///
/// See the module documentation.
#[no_mangle]
pub unsafe extern "C" fn kmq_update(handle: *mut NativeState, reseeded: *mut u32) -> i32 {
    let state = match state_mut(handle) {
        Ok(state) => state,
        Err(code) => return code,
    };
    guard(|| {
        let count = state.update()?;
        if let Some(out) = reseeded.as_mut() {
            *out = count;
        }
        Ok(())
    })
}

/// Write drift, its normalization constant and the convergence percentage
/// to `out`.
///
/// # Safety
///
/// See the module documentation.
#[no_mangle]
pub unsafe extern "C" fn kmq_convergence(
    handle: *const NativeState,
    out: *mut RawConvergence,
) -> i32 {
    let (state, out) = match (handle.as_ref(), out.as_mut()) {
        (Some(state), Some(out)) => (state, out),
        _ => return KMQ_ERR_NULL,
    };
    guard(|| {
        *out = state.convergence()?.into();
        Ok(())
    })
}

/// Convergence threshold the handle was created with; NaN for a null handle.
///
/// # Safety
///
/// See the module documentation.
#[no_mangle]
pub unsafe extern "C" fn kmq_threshold(handle: *const NativeState) -> f32 {
    handle.as_ref().map_or(f32::NAN, NativeState::threshold)
}

/// Fill `out[0..k]` with views of the clusters. `out_len` must be at least `k`.
///
/// # Safety
///
/// See the module documentation. The views are invalidated by the next
/// mutating call on the handle.
#[no_mangle]
pub unsafe extern "C" fn kmq_clusters(
    handle: *const NativeState,
    out: *mut RawCluster,
    out_len: u32,
) -> i32 {
    let state = match handle.as_ref() {
        Some(state) if !out.is_null() => state,
        _ => return KMQ_ERR_NULL,
    };
    if !state.is_seeded() {
        return status_of(&KMeansError::NotSeeded);
    }
    let k = state.k();
    if (out_len as usize) < k {
        return KMQ_ERR_DIMENSIONS;
    }

    let dim = state.dim();
    let out = slice::from_raw_parts_mut(out, k);
    for (j, raw) in out.iter_mut().enumerate() {
        let members = state.members(j);
        *raw = RawCluster {
            dim: dim as u32,
            centroid: state.centroids()[j * dim..].as_ptr(),
            previous_centroid: state.previous_centroids()[j * dim..].as_ptr(),
            size: members.len() as u64,
            indices: members.as_ptr(),
        };
    }
    KMQ_OK
}

/// Free the handle and everything it owns. A null handle is ignored.
///
/// # Safety
///
/// `handle` must not be used after this call.
#[no_mangle]
pub unsafe extern "C" fn kmq_release(handle: *mut NativeState) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}
