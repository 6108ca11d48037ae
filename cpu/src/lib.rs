// strand-cpu

mod cache_padded;
pub mod fence;

pub use {
    cache_padded::CachePadded,
    fence::{cpu_pause, fence_seq_cst},
};
