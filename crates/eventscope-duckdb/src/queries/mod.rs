pub mod range;
pub mod realtime;
