// Identity token verification
// Tokens are issued by the external identity service; `create_token` exists
// for development and tests

pub mod jwt;
