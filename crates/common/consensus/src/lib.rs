pub mod attestation;
pub mod block;
pub mod bls;
pub mod checkpoint;
pub mod constants;
pub mod fork;
pub mod interop;
pub mod misc;
pub mod primitives;
pub mod state;
pub mod transition;
pub mod validator;
