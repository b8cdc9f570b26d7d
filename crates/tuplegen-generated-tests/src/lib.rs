//! tuplegen output compiled as ordinary Rust.
//!
//! `build.rs` renders the specs in [`specs`] into `OUT_DIR`; the modules
//! below include them, so a rendering that does not compile fails this
//! crate's build.

pub mod specs;

/// `generated.Conv` version 1.
pub mod conv_v1 {
    include!(concat!(env!("OUT_DIR"), "/conv_v1.rs"));
}

/// `generated.Conv` version 2 with its `v1` shape and `reconcile_from`.
pub mod conv_v2 {
    include!(concat!(env!("OUT_DIR"), "/conv_v2.rs"));
}

/// `generated.ItemRow` and the statements over `item`.
pub mod items {
    include!(concat!(env!("OUT_DIR"), "/item_row.rs"));
    include!(concat!(env!("OUT_DIR"), "/items.rs"));
    include!(concat!(env!("OUT_DIR"), "/restock.rs"));
}
