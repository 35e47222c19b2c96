//! Cache-aligned, const-generic SPSC ring buffer.
//!
//! `Ring<T, N>` is the bounded, non-blocking hand-off used between the
//! ticker pipeline's stages (ingress → compute → persistence). Each ring
//! has exactly one producer and one consumer; there is no multi-producer
//! decomposition here, unlike a general-purpose MPSC channel, because each
//! pipeline stage boundary is a strict 1:1 hand-off.
//!
//! # Example
//!
//! ```
//! use ticker_ring::Ring;
//!
//! let ring: Ring<u64, 4> = Ring::new();
//! assert!(ring.try_push(42).is_ok());
//! assert_eq!(ring.try_pop(), Some(42));
//! ```

mod ring;

pub use ring::Ring;
