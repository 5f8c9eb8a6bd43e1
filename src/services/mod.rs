pub mod audit_sink;
pub mod credential_resolver;
pub mod gateway;
pub mod permission_authorizer;
pub mod url_signer;

#[cfg(test)]
pub mod testing;
