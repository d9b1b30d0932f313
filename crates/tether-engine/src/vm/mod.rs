//! Tree-walking interpreter over a generational object heap

pub mod builtins;
pub mod convert;
pub mod heap;
pub mod interp;
pub mod proxy;
pub mod realm;
pub mod value;
