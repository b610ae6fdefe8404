#![forbid(unsafe_code)]

//! Network models for routing verification: topologies, the route record
//! type, symbolic parameters, and the compiled [`Network`] that binds
//! per-node initial routes, per-edge transfer functions, merge, temporal
//! annotations and safety properties into one immutable model.

mod network;
mod route;
mod spec;
mod symbolic;
mod topology;

pub use network::{
    AnnotationFn, MergeFn, Network, NetworkError, PropertyFn, RouteFn,
};
pub use route::RouteType;
pub use spec::{BuildError, EdgePolicy, NetworkSpec, NodeSpec, RouteKind, SymbolicSpec};
pub use symbolic::SymbolicParam;
pub use topology::Topology;
