//! Remote ERP abstractions
//!
//! Trait-based access to the ERP's transaction programs so the workflow can run
//! against the host's client, the offline sandbox, or a mock.

pub mod api;
pub mod gateway;
pub mod records;
pub mod sandbox;

pub use api::{RemoteApi, RemoteError, RemoteErrorKind, RemoteRecord, RemoteRequest, RemoteResponse};
pub use gateway::{
    EquipmentRecord, ErpGateway, GatewayError, ReceiptHeaderRequest, ReceiptLineRequest,
    SessionStamp,
};
pub use records::RecordError;
pub use sandbox::{InjectedFailure, SandboxFixture, SandboxRemote};

#[cfg(any(test, feature = "testing"))]
pub use api::MockRemoteApi;
