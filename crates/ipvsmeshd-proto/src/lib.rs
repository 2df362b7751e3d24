//! Generated tonic/prost bindings for the local IPC control surface (§6
//! "IPC control": a Unix-domain gRPC socket with a single
//! `Stop(Empty) -> Empty` RPC).

tonic::include_proto!("ipvsmesh.control");
