// Stashed services
// Services are the collaborator seams: remote store and auth provider
// contracts plus their HTTP/in-memory implementations, the session bridge,
// and the cipher guarding the session record at rest.

pub mod auth_client;
pub mod crypto_service;
pub mod remote_store;
pub mod session_bridge;
