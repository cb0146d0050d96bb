pub mod client_ip;
pub mod cors;
pub mod json_body;
pub mod request_id;

pub use client_ip::ClientIp;
pub use cors::cors_layer;
pub use json_body::{ApiJson, OptionalJson};
pub use request_id::{request_id_middleware, REQUEST_ID_HEADER};
