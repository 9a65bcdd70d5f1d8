pub mod align;
pub mod boxes;
pub mod chain;
pub mod fmt;
pub mod gapless;
pub mod io;
pub mod nt;
pub mod params;
pub mod seed;
pub mod seq;
pub mod server;
pub mod twobit;
