// Request/response core: transport, error taxonomy, bodies, logging, and stream tee.
pub mod body;
pub mod error;
pub mod headers;
pub mod logging;
pub mod tee;
pub mod transport;
